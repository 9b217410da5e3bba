//! # Query Builder
//!
//! Single-question recursive queries, one per datagram.
//!
//! ```rust
//! use subsweep::dns::{RecordType, build_query};
//!
//! let msg = build_query("example.com", RecordType::Mx.code()).unwrap();
//! assert!(msg.header.flags.rd);
//! assert!(msg.header.id <= 65534);
//! ```
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{EncodeErrors, HeaderFlags, Message, Name, OpCode, Question};

/// Generates a random transaction id in `0..=65534`.
pub fn generate_id() -> u16 {
    let mut thread_rng = rand::rng();
    let mut rng = SmallRng::from_rng(&mut thread_rng);

    rng.random_range(0..=65534)
}

/// Builds a standard query for `name` with recursion desired and a fresh id.
///
/// Fails if `name` cannot be put on the wire (empty label, label over 63
/// bytes, name over 255 bytes).
pub fn build_query(name: &str, qtype: u16) -> Result<Message, EncodeErrors> {
    let name: Name = name.parse()?;

    let flags = HeaderFlags {
        opcode: OpCode::Query as u8,
        rd: true,
        ..HeaderFlags::default()
    };

    let mut msg = Message::new(generate_id(), flags);
    msg.questions.push(Question::new(name, qtype));
    msg.sync_counts()?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{CLASS_IN, RecordType};

    #[test]
    fn test_build_query_shape() {
        let msg = build_query("www.example.com", RecordType::A.code()).unwrap();

        assert!(!msg.header.flags.qr);
        assert_eq!(msg.header.flags.opcode, 0);
        assert!(msg.header.flags.rd);
        assert!(!msg.header.flags.aa);
        assert_eq!(msg.header.qd_count, 1);
        assert_eq!(msg.header.an_count, 0);
        assert!(msg.answers.is_empty());

        let q = msg.first_question().unwrap();
        assert_eq!(q.name.to_string(), "www.example.com");
        assert_eq!(q.qtype, 1);
        assert_eq!(q.qclass, CLASS_IN);
    }

    #[test]
    fn test_build_query_wire_bytes() {
        let msg = build_query("ab.c", RecordType::Txt.code()).unwrap();
        let bytes = msg.encode().unwrap();
        let id = msg.header.id.to_be_bytes();

        assert_eq!(
            bytes,
            vec![
                id[0], id[1], 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 2, b'a',
                b'b', 1, b'c', 0, 0x00, 0x10, 0x00, 0x01,
            ]
        );
    }

    #[test]
    fn test_build_query_rejects_bad_names() {
        assert!(matches!(
            build_query("a..b", 1),
            Err(EncodeErrors::EmptyLabel(_))
        ));
        let long = format!("{}.com", "x".repeat(64));
        assert!(matches!(
            build_query(&long, 1),
            Err(EncodeErrors::LabelTooLong(_))
        ));
    }

    #[test]
    fn test_generate_id_range_and_spread() {
        let ids: Vec<u16> = (0..2000).map(|_| generate_id()).collect();
        assert!(ids.iter().all(|&id| id != u16::MAX));

        let mut distinct = ids.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert!(distinct.len() > 1900);
    }
}
