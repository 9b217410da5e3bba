//! # Subsweep DNS Wire Codec
//!
//! A small, dependency-light implementation of the RFC 1035 message format,
//! built for one job: turning candidate names into query datagrams and
//! turning resolver replies back into records, as fast as possible and
//! without trusting the bytes that come back.
//!
//! ## Modules
//!
//! - [`name`] - label sequences, compression pointer resolution (decode only).
//! - [`message`] - header flags, questions, resource records and full messages.
//! - [`query`] - single-question query construction with random transaction ids.
//!
//! The codec is always compiled, with or without the `tokio-dep` feature, so it
//! can be reused with any transport.
//!
//! ## Error Handling
//!
//! - [`DecodeErrors`] - malformed or truncated input. Every decoder returns it
//!   instead of panicking, whatever the bytes are.
//! - [`EncodeErrors`] - a value that cannot be represented on the wire
//!   (label too long, name too long, too many records in a section).
//!
//! ## Quick Example
//!
//! ```rust
//! use subsweep::dns::{Message, RecordType, build_query};
//!
//! let query = build_query("www.example.com", RecordType::A.code()).unwrap();
//! let bytes = query.encode().unwrap();
//!
//! let parsed = Message::decode(&bytes).unwrap();
//! assert_eq!(parsed.first_question().unwrap().name.to_string(), "www.example.com");
//! ```
use thiserror::Error;

pub mod message;
pub mod name;
pub mod query;

pub use message::{
    CLASS_IN, Header, HeaderFlags, Message, OpCode, Question, RecordData, RecordType,
    ResourceRecord, UnknownRecordType,
};
pub use name::Name;
pub use query::{build_query, generate_id};

/// Errors raised while reading a message from untrusted bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrors {
    #[error("message truncated: {needed} byte(s) needed at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("label of length {len} at offset {offset} runs past the end of the message")]
    LabelOutOfBounds { offset: usize, len: u8 },

    #[error("compression pointer at offset {at} targets offset {target}, which is not before it")]
    ForwardPointer { at: usize, target: usize },

    #[error("compression pointer at offset {at} revisits offset {target}")]
    PointerLoop { at: usize, target: usize },

    #[error("reserved label type {len:#04x} at offset {offset}")]
    ReservedLabelType { offset: usize, len: u8 },

    #[error("domain name is longer than 255 octets")]
    NameTooLong,
}

/// Errors raised while writing a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeErrors {
    #[error("label too long (>63): {0}")]
    LabelTooLong(String),

    #[error("empty label in name: {0}")]
    EmptyLabel(String),

    #[error("name is too long (>255): {0}")]
    NameTooLong(String),

    #[error("resource data of {0} bytes does not fit a 16-bit length")]
    RdataTooLong(usize),

    #[error("{count} entries in the {section} section do not fit a 16-bit count")]
    TooManyRecords { section: &'static str, count: usize },
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Result<u16, DecodeErrors> {
    match buf.get(offset..offset + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err(DecodeErrors::Truncated { offset, needed: 2 }),
    }
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32, DecodeErrors> {
    match buf.get(offset..offset + 4) {
        Some(b) => Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(DecodeErrors::Truncated { offset, needed: 4 }),
    }
}
