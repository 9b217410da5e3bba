//! # Domain Name Codec
//!
//! Reads and writes domain names in the RFC 1035 §3.1 / §4.1.4 wire format.
//!
//! A name on the wire is a sequence of labels, each introduced by a length
//! octet, ending either with a zero octet (the root label) or with a
//! two-octet **compression pointer** that reuses labels written earlier in
//! the same message:
//!
//! ```text
//!   +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//!   | 1  1|                OFFSET                   |
//!   +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! ```
//!
//! Compression is only ever **read**. Names produced by [`Name::encode`] are
//! always written in full, which keeps outgoing queries trivially small and
//! avoids a pointer table on the hot path.
//!
//! ## Malformed input
//!
//! Replies come from the network and are not trusted. Decoding fails fast
//! with a [`DecodeErrors`] instead of panicking or looping:
//!
//! - every read is bounds checked,
//! - a pointer must target an offset strictly before itself,
//! - every pointer target is remembered and a repeated target is a loop,
//! - the `01` / `10` label types (reserved by RFC 1035) are rejected,
//! - a decoded name may not exceed 255 octets.
//!
//! ## Example
//!
//! ```rust
//! use subsweep::dns::Name;
//!
//! let name: Name = "www.example.com".parse().unwrap();
//! let mut wire = Vec::new();
//! name.encode(&mut wire).unwrap();
//!
//! let (decoded, consumed) = Name::decode(&wire, 0).unwrap();
//! assert_eq!(decoded, name);
//! assert_eq!(consumed, wire.len());
//! ```
use std::{collections::HashSet, fmt::Display, str::FromStr};

use super::{DecodeErrors, EncodeErrors};

/// Longest label allowed by RFC 1035.
pub const MAX_LABEL_LEN: usize = 63;
/// Longest name allowed by RFC 1035, counted in wire octets.
pub const MAX_NAME_LEN: usize = 255;

const POINTER_MASK: u8 = 0b1100_0000;

/// An ordered list of labels, most specific first.
///
/// Labels are kept as raw octets so that names which are not valid UTF-8
/// survive a decode/encode round trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    labels: Vec<Vec<u8>>,
}

impl Name {
    /// The root name (no labels).
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Builds a name from already split labels.
    pub fn from_labels<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of octets this name occupies when written uncompressed.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Decodes the name starting at `offset` inside the full message `buf`.
    ///
    /// Returns the name and the number of octets it occupies **at `offset`**:
    /// a pointer counts as two octets, the labels found at its target are
    /// not added. Pointer chains of any depth are followed.
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Name, usize), DecodeErrors> {
        let mut labels = Vec::new();
        let mut pos = offset;
        let mut wire_len = 1;
        let mut consumed = None;
        let mut visited = HashSet::new();

        loop {
            let len = *buf.get(pos).ok_or(DecodeErrors::Truncated {
                offset: pos,
                needed: 1,
            })?;

            match len & POINTER_MASK {
                0b0000_0000 if len == 0 => {
                    let consumed = consumed.unwrap_or(pos + 1 - offset);
                    return Ok((Name { labels }, consumed));
                }
                0b0000_0000 => {
                    let start = pos + 1;
                    let end = start + len as usize;
                    let label = buf.get(start..end).ok_or(DecodeErrors::LabelOutOfBounds {
                        offset: pos,
                        len,
                    })?;

                    wire_len += label.len() + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(DecodeErrors::NameTooLong);
                    }
                    labels.push(label.to_vec());
                    pos = end;
                }
                POINTER_MASK => {
                    let low = *buf.get(pos + 1).ok_or(DecodeErrors::Truncated {
                        offset: pos + 1,
                        needed: 1,
                    })?;
                    let target = (u16::from_be_bytes([len & !POINTER_MASK, low])) as usize;

                    if target >= pos {
                        return Err(DecodeErrors::ForwardPointer { at: pos, target });
                    }
                    if !visited.insert(target) {
                        return Err(DecodeErrors::PointerLoop { at: pos, target });
                    }
                    // The first pointer ends the name as far as the caller's offset is concerned.
                    consumed.get_or_insert(pos + 2 - offset);
                    pos = target;
                }
                _ => {
                    return Err(DecodeErrors::ReservedLabelType { offset: pos, len });
                }
            }
        }
    }

    /// Appends the uncompressed wire form of this name to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeErrors> {
        if self.wire_len() > MAX_NAME_LEN {
            return Err(EncodeErrors::NameTooLong(self.to_string()));
        }

        for label in &self.labels {
            if label.is_empty() {
                return Err(EncodeErrors::EmptyLabel(self.to_string()));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(EncodeErrors::LabelTooLong(
                    String::from_utf8_lossy(label).into_owned(),
                ));
            }
            out.push(label.len() as u8);
            out.extend_from_slice(label);
        }
        out.push(0);
        Ok(())
    }

    /// Checks that the name could be written to the wire.
    pub fn validate(&self) -> Result<(), EncodeErrors> {
        self.encode(&mut Vec::with_capacity(self.wire_len()))
    }
}

impl FromStr for Name {
    type Err = EncodeErrors;

    /// Splits on `.`. A single trailing dot is accepted; `""` and `"."` are the root.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Name::root());
        }

        let name = Name::from_labels(trimmed.split('.').map(str::as_bytes));
        name.validate()?;
        Ok(name)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}
