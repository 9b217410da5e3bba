//! # DNS Message
//!
//! Header, question and resource-record codecs composed into a full
//! [`Message`] (RFC 1035 §4.1).
//!
//! ```text
//!     +---------------------+
//!     |        Header       |  12 octets, big-endian
//!     +---------------------+
//!     |       Question      |  QDCOUNT entries
//!     +---------------------+
//!     |        Answer       |  ANCOUNT resource records
//!     +---------------------+
//!     |      Authority      |  NSCOUNT resource records
//!     +---------------------+
//!     |      Additional     |  ARCOUNT resource records
//!     +---------------------+
//! ```
//!
//! Decoding reads exactly the number of entries the header declares, in
//! order, and fails with [`DecodeErrors`] as soon as a read would leave the
//! buffer. Bytes after the last declared entry are ignored.
//!
//! Encoding writes section counts from the vector lengths, so a message can
//! never go out with a header that disagrees with its body.
use std::{
    fmt::Display,
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use super::{DecodeErrors, EncodeErrors, Name, read_u16, read_u32};

/// The Internet class.
pub const CLASS_IN: u16 = 1;

/// Size of the fixed header.
pub const HEADER_LEN: usize = 12;

/// A full DNS message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    // The question for the name server
    pub questions: Vec<Question>,
    // RRs answering the question
    pub answers: Vec<ResourceRecord>,
    // RRs pointing toward an authority
    pub authorities: Vec<ResourceRecord>,
    // RRs holding additional information
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    /// An empty message with the given id and flags.
    pub fn new(id: u16, flags: HeaderFlags) -> Self {
        Self {
            header: Header {
                id,
                flags,
                ..Header::default()
            },
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Decodes a complete message from `buf`.
    pub fn decode(buf: &[u8]) -> Result<Message, DecodeErrors> {
        let header = Header::decode(buf)?;
        let mut offset = HEADER_LEN;

        let mut questions = Vec::with_capacity(header.qd_count.min(16) as usize);
        for _ in 0..header.qd_count {
            let (question, len) = Question::decode(buf, offset)?;
            questions.push(question);
            offset += len;
        }

        let mut sections: [Vec<ResourceRecord>; 3] = Default::default();
        let counts = [header.an_count, header.ns_count, header.ar_count];
        for (records, count) in sections.iter_mut().zip(counts) {
            for _ in 0..count {
                let (record, len) = ResourceRecord::decode(buf, offset)?;
                records.push(record);
                offset += len;
            }
        }
        let [answers, authorities, additional] = sections;

        Ok(Message {
            header,
            questions,
            answers,
            authorities,
            additional,
        })
    }

    /// Encodes the message. Section counts are taken from the vectors.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeErrors> {
        let mut header = self.header;
        header.set_counts(self)?;

        let mut out = Vec::with_capacity(512);
        out.extend_from_slice(&header.to_bytes());

        for question in &self.questions {
            question.encode(&mut out)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additional)
        {
            record.encode(&mut out)?;
        }
        Ok(out)
    }

    /// Brings the header counts in line with the section vectors.
    pub fn sync_counts(&mut self) -> Result<(), EncodeErrors> {
        let mut header = self.header;
        header.set_counts(self)?;
        self.header = header;
        Ok(())
    }

    pub fn first_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    pub fn is_response(&self) -> bool {
        self.header.flags.qr
    }

    /// RCODE of the header, 0 meaning no error and 3 NXDOMAIN.
    pub fn response_code(&self) -> u8 {
        self.header.flags.rcode
    }
}

/// Fixed 12-byte header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Identifier copied by the server into its reply.
    pub id: u16,
    /// Flags and control bits, see [`HeaderFlags`].
    pub flags: HeaderFlags,
    /// Number of entries in the question section.
    pub qd_count: u16,
    /// Number of resource records in the answer section.
    pub an_count: u16,
    /// Number of name server records in the authority section.
    pub ns_count: u16,
    /// Number of resource records in the additional section.
    pub ar_count: u16,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..2].copy_from_slice(&self.id.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.flags.to_u16().to_be_bytes());
        bytes[4..6].copy_from_slice(&self.qd_count.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.an_count.to_be_bytes());
        bytes[8..10].copy_from_slice(&self.ns_count.to_be_bytes());
        bytes[10..12].copy_from_slice(&self.ar_count.to_be_bytes());
        bytes
    }

    pub fn decode(buf: &[u8]) -> Result<Header, DecodeErrors> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeErrors::Truncated {
                offset: buf.len(),
                needed: HEADER_LEN - buf.len(),
            });
        }

        Ok(Header {
            id: read_u16(buf, 0)?,
            flags: HeaderFlags::from_u16(read_u16(buf, 2)?),
            qd_count: read_u16(buf, 4)?,
            an_count: read_u16(buf, 6)?,
            ns_count: read_u16(buf, 8)?,
            ar_count: read_u16(buf, 10)?,
        })
    }

    fn set_counts(&mut self, msg: &Message) -> Result<(), EncodeErrors> {
        fn count(section: &'static str, len: usize) -> Result<u16, EncodeErrors> {
            u16::try_from(len).map_err(|_| EncodeErrors::TooManyRecords {
                section,
                count: len,
            })
        }

        self.qd_count = count("question", msg.questions.len())?;
        self.an_count = count("answer", msg.answers.len())?;
        self.ns_count = count("authority", msg.authorities.len())?;
        self.ar_count = count("additional", msg.additional.len())?;
        Ok(())
    }
}

/// The 16-bit flags field (RFC 1035 §4.1.1).
///
/// ```text
///   15 14 13 12 11 10  9  8  7  6  5  4  3  2  1  0
///  +--+-----------+--+--+--+--+--------+-----------+
///  |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
///  +--+-----------+--+--+--+--+--------+-----------+
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags {
    /// Query/Response flag
    pub qr: bool,
    /// Operation code, 4 bits
    /// Use [`OpCode`]
    pub opcode: u8,
    /// Authoritative Answer
    pub aa: bool,
    /// Truncation flag
    pub tc: bool,
    /// Recursion Desired
    pub rd: bool,
    /// Recursion Available
    pub ra: bool,
    /// Reserved bits, carried through unchanged
    pub z: u8,
    /// Response code, 4 bits
    pub rcode: u8,
}

impl HeaderFlags {
    /// Encode the flags into a 16-bit integer.
    pub fn to_u16(self) -> u16 {
        ((self.qr as u16) << 15)
            | ((self.opcode as u16 & 0b1111) << 11)
            | ((self.aa as u16) << 10)
            | ((self.tc as u16) << 9)
            | ((self.rd as u16) << 8)
            | ((self.ra as u16) << 7)
            | ((self.z as u16 & 0b111) << 4)
            | (self.rcode as u16 & 0b1111)
    }

    /// Decode from a 16-bit integer into structured flags.
    pub fn from_u16(value: u16) -> Self {
        Self {
            qr: (value >> 15) & 1 != 0,
            opcode: ((value >> 11) & 0b1111) as u8,
            aa: (value >> 10) & 1 != 0,
            tc: (value >> 9) & 1 != 0,
            rd: (value >> 8) & 1 != 0,
            ra: (value >> 7) & 1 != 0,
            z: ((value >> 4) & 0b111) as u8,
            rcode: (value & 0b1111) as u8,
        }
    }
}

// 3-15 reserved for future use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Query = 0,
    InverseQuery = 1,
    Status = 2,
}

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// The domain name being queried.
    pub name: Name,
    /// The numeric record type requested. See [`RecordType`] for named codes.
    pub qtype: u16,
    /// The class, [`CLASS_IN`] in practice.
    pub qclass: u16,
}

impl Question {
    pub fn new(name: Name, qtype: u16) -> Self {
        Self {
            name,
            qtype,
            qclass: CLASS_IN,
        }
    }

    pub fn decode(buf: &[u8], offset: usize) -> Result<(Question, usize), DecodeErrors> {
        let (name, name_len) = Name::decode(buf, offset)?;
        let fields = offset + name_len;

        Ok((
            Question {
                name,
                qtype: read_u16(buf, fields)?,
                qclass: read_u16(buf, fields + 2)?,
            },
            name_len + 4,
        ))
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeErrors> {
        self.name.encode(out)?;
        out.extend_from_slice(&self.qtype.to_be_bytes());
        out.extend_from_slice(&self.qclass.to_be_bytes());
        Ok(())
    }
}

/// A resource record from the answer, authority or additional section.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    /// The domain name that owns this record.
    pub name: Name,
    /// The numeric record type.
    pub rtype: u16,
    /// The class of the record (usually IN).
    pub class: u16,
    /// Time-to-live of the record in seconds.
    pub ttl: u32,
    /// The raw resource data, exactly as it appeared on the wire.
    pub rdata: Vec<u8>,
    /// The resource data interpreted according to `rtype`.
    pub data: RecordData,
}

impl ResourceRecord {
    /// Builds a record from raw rdata. Names inside `rdata` must not be compressed.
    pub fn new(name: Name, rtype: u16, ttl: u32, rdata: Vec<u8>) -> Self {
        let data = RecordData::parse(rtype, &rdata, 0, rdata.len());
        Self {
            name,
            rtype,
            class: CLASS_IN,
            ttl,
            rdata,
            data,
        }
    }

    /// An `A` record.
    pub fn a(name: Name, ttl: u32, addr: Ipv4Addr) -> Self {
        Self::new(name, RecordType::A.code(), ttl, addr.octets().to_vec())
    }

    /// A `CNAME` record pointing at `target`.
    pub fn cname(name: Name, ttl: u32, target: &Name) -> Result<Self, EncodeErrors> {
        let mut rdata = Vec::with_capacity(target.wire_len());
        target.encode(&mut rdata)?;
        Ok(Self::new(name, RecordType::Cname.code(), ttl, rdata))
    }

    pub fn decode(buf: &[u8], offset: usize) -> Result<(ResourceRecord, usize), DecodeErrors> {
        let (name, name_len) = Name::decode(buf, offset)?;
        let mut pos = offset + name_len;

        let rtype = read_u16(buf, pos)?;
        let class = read_u16(buf, pos + 2)?;
        let ttl = read_u32(buf, pos + 4)?;
        let rd_length = read_u16(buf, pos + 8)? as usize;
        pos += 10;

        let rdata = buf
            .get(pos..pos + rd_length)
            .ok_or(DecodeErrors::Truncated {
                offset: pos,
                needed: rd_length,
            })?
            .to_vec();
        let data = RecordData::parse(rtype, buf, pos, rd_length);

        Ok((
            ResourceRecord {
                name,
                rtype,
                class,
                ttl,
                rdata,
                data,
            },
            name_len + 10 + rd_length,
        ))
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeErrors> {
        let rd_length =
            u16::try_from(self.rdata.len()).map_err(|_| EncodeErrors::RdataTooLong(self.rdata.len()))?;

        self.name.encode(out)?;
        out.extend_from_slice(&self.rtype.to_be_bytes());
        out.extend_from_slice(&self.class.to_be_bytes());
        out.extend_from_slice(&self.ttl.to_be_bytes());
        out.extend_from_slice(&rd_length.to_be_bytes());
        out.extend_from_slice(&self.rdata);
        Ok(())
    }
}

/// Resource data interpreted by record type.
///
/// Anything that is not understood, or that does not decode cleanly, is kept
/// as [`RecordData::Opaque`]; a bad rdata never fails the whole message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    /// CNAME, NS and PTR targets.
    Name(Name),
    Mx { preference: u16, exchange: Name },
    Txt(Vec<String>),
    Opaque(Vec<u8>),
}

impl RecordData {
    /// Interprets `len` bytes of rdata found at `offset` inside the full message `buf`.
    pub fn parse(rtype: u16, buf: &[u8], offset: usize, len: usize) -> RecordData {
        let Some(raw) = buf.get(offset..offset + len) else {
            return RecordData::Opaque(Vec::new());
        };

        let parsed = match RecordType::from_code(rtype) {
            Some(RecordType::A) => <[u8; 4]>::try_from(raw).ok().map(|o| RecordData::A(o.into())),
            Some(RecordType::Aaaa) => <[u8; 16]>::try_from(raw)
                .ok()
                .map(|o| RecordData::Aaaa(o.into())),
            Some(RecordType::Cname | RecordType::Ns | RecordType::Ptr) => {
                Self::name_within(buf, offset, len).map(RecordData::Name)
            }
            Some(RecordType::Mx) if len > 2 => {
                let preference = u16::from_be_bytes([raw[0], raw[1]]);
                Self::name_within(buf, offset + 2, len - 2)
                    .map(|exchange| RecordData::Mx { preference, exchange })
            }
            Some(RecordType::Txt) => Self::character_strings(raw).map(RecordData::Txt),
            _ => None,
        };

        parsed.unwrap_or_else(|| RecordData::Opaque(raw.to_vec()))
    }

    /// A name that must fit inside the rdata bounds (pointers may leave them).
    fn name_within(buf: &[u8], offset: usize, len: usize) -> Option<Name> {
        match Name::decode(buf, offset) {
            Ok((name, consumed)) if consumed <= len => Some(name),
            _ => None,
        }
    }

    fn character_strings(raw: &[u8]) -> Option<Vec<String>> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < raw.len() {
            let len = raw[pos] as usize;
            let text = raw.get(pos + 1..pos + 1 + len)?;
            out.push(String::from_utf8_lossy(text).into_owned());
            pos += 1 + len;
        }
        Some(out)
    }
}

impl Display for RecordData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordData::A(ip) => write!(f, "{}", ip),
            RecordData::Aaaa(ip) => write!(f, "{}", ip),
            RecordData::Name(name) => write!(f, "{}", name),
            RecordData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RecordData::Txt(parts) => write!(f, "\"{}\"", parts.join("\" \"")),
            RecordData::Opaque(raw) => {
                for b in raw {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Named record type codes.
///
/// Wire structures keep the raw `u16` so that replies carrying types not
/// listed here still decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordType {
    // A host address
    A = 1,
    // An authoritative name server
    Ns = 2,
    // The canonical name for an alias
    Cname = 5,
    // Marks the start of a zone of authority
    Soa = 6,
    // A domain name pointer
    Ptr = 12,
    // Mail exchange
    Mx = 15,
    // Text strings
    Txt = 16,
    // An IPv6 host address
    Aaaa = 28,
    // Zone transfer
    Axfr = 252,
    // Any type (deprecated by most resolvers)
    Any = 255,
}

impl RecordType {
    pub const ALL: [RecordType; 10] = [
        RecordType::A,
        RecordType::Ns,
        RecordType::Cname,
        RecordType::Soa,
        RecordType::Ptr,
        RecordType::Mx,
        RecordType::Txt,
        RecordType::Aaaa,
        RecordType::Axfr,
        RecordType::Any,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<RecordType> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Ns => "NS",
            RecordType::Cname => "CNAME",
            RecordType::Soa => "SOA",
            RecordType::Ptr => "PTR",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Aaaa => "AAAA",
            RecordType::Axfr => "AXFR",
            RecordType::Any => "ANY",
        }
    }

    /// Renders any code, falling back to the RFC 3597 `TYPEnnn` form.
    pub fn describe(code: u16) -> String {
        match RecordType::from_code(code) {
            Some(t) => t.name().to_string(),
            None => format!("TYPE{}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown record type '{0}', expected one of A|NS|CNAME|SOA|PTR|MX|TXT|AAAA|AXFR|ANY")]
pub struct UnknownRecordType(pub String);

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRecordType(s.to_string()))
    }
}

impl TryFrom<String> for RecordType {
    type Error = UnknownRecordType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.name().to_string()
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A reply for www.example.com/A carrying one uncompressed answer.
    fn uncompressed_reply() -> Vec<u8> {
        let mut buf = vec![
            0xBE, 0xEF, // id
            0x81, 0x80, // qr rd ra
            0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        let question = [
            3, b'w', b'w', b'w', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm',
            0, 0x00, 0x01, 0x00, 0x01,
        ];
        buf.extend_from_slice(&question);
        buf.extend_from_slice(&question[..17]);
        buf.extend_from_slice(&[
            0x00, 0x01, 0x00, 0x01, // A IN
            0x00, 0x00, 0x0E, 0x10, // ttl 3600
            0x00, 0x04, 93, 184, 216, 34,
        ]);
        buf
    }

    #[test]
    fn test_record_type_codes_and_names() {
        assert_eq!(RecordType::A.code(), 1);
        assert_eq!(RecordType::Txt.code(), 16);
        assert_eq!(RecordType::from_code(5), Some(RecordType::Cname));
        assert_eq!(RecordType::from_code(99), None);
        assert_eq!("cname".parse::<RecordType>().unwrap(), RecordType::Cname);
        assert_eq!(" aaaa ".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert!("WKS".parse::<RecordType>().is_err());
        assert_eq!(RecordType::describe(46), "TYPE46");
    }

    #[test]
    fn test_header_flags_every_combination_round_trips() {
        for bools in 0u8..32 {
            for opcode in 0u8..16 {
                for rcode in 0u8..16 {
                    for z in 0u8..8 {
                        let flags = HeaderFlags {
                            qr: bools & 0b0_0001 != 0,
                            aa: bools & 0b0_0010 != 0,
                            tc: bools & 0b0_0100 != 0,
                            rd: bools & 0b0_1000 != 0,
                            ra: bools & 0b1_0000 != 0,
                            opcode,
                            z,
                            rcode,
                        };
                        let header = Header {
                            id: u16::from(bools) << 8 | u16::from(rcode),
                            flags,
                            ..Header::default()
                        };

                        let bytes = header.to_bytes();
                        assert_eq!(Header::decode(&bytes).unwrap(), header);
                        assert_eq!(
                            HeaderFlags::from_u16(u16::from_be_bytes([bytes[2], bytes[3]])),
                            flags
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_header_flag_bit_positions() {
        assert_eq!(
            HeaderFlags {
                qr: true,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x8000
        );
        assert_eq!(
            HeaderFlags {
                opcode: 0b1111,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x7800
        );
        assert_eq!(
            HeaderFlags {
                aa: true,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x0400
        );
        assert_eq!(
            HeaderFlags {
                tc: true,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x0200
        );
        assert_eq!(
            HeaderFlags {
                rd: true,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x0100
        );
        assert_eq!(
            HeaderFlags {
                ra: true,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x0080
        );
        assert_eq!(
            HeaderFlags {
                rcode: 0b1111,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x000F
        );
        // Out of range values are masked, never bleed into neighbours.
        assert_eq!(
            HeaderFlags {
                opcode: 0xFF,
                rcode: 0xFF,
                ..HeaderFlags::default()
            }
            .to_u16(),
            0x780F
        );
    }

    #[test]
    fn test_decode_uncompressed_reply() {
        let bytes = uncompressed_reply();
        let msg = Message::decode(&bytes).unwrap();

        assert_eq!(msg.header.id, 0xBEEF);
        assert!(msg.is_response());
        assert!(msg.header.flags.rd);
        assert!(msg.header.flags.ra);
        assert_eq!(msg.questions.len(), 1);
        assert_eq!(msg.answers.len(), 1);

        let question = msg.first_question().unwrap();
        assert_eq!(question.name.to_string(), "www.example.com");
        assert_eq!(question.qtype, RecordType::A.code());
        assert_eq!(question.qclass, CLASS_IN);

        let answer = &msg.answers[0];
        assert_eq!(answer.ttl, 3600);
        assert_eq!(answer.data, RecordData::A(Ipv4Addr::new(93, 184, 216, 34)));
    }

    #[test]
    fn test_uncompressed_message_re_encodes_byte_for_byte() {
        let bytes = uncompressed_reply();
        let msg = Message::decode(&bytes).unwrap();
        assert_eq!(msg.encode().unwrap(), bytes);

        // Reserved bits and unknown types survive as well.
        let mut odd = bytes.clone();
        odd[3] |= 0b0111_0000;
        let rtype_at = 12 + 21 + 17;
        odd[rtype_at] = 0xAB;
        odd[rtype_at + 1] = 0xCD;
        let msg = Message::decode(&odd).unwrap();
        assert_eq!(msg.header.flags.z, 0b111);
        assert!(matches!(msg.answers[0].data, RecordData::Opaque(_)));
        assert_eq!(msg.encode().unwrap(), odd);
    }

    #[test]
    fn test_decode_compressed_cname_chain() {
        let mut buf = vec![
            0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
        ];
        // question at 12: mail.example.com CNAME IN
        buf.extend_from_slice(&[
            4, b'm', b'a', b'i', b'l', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o',
            b'm', 0, 0x00, 0x05, 0x00, 0x01,
        ]);
        // answer 1: ptr(12) CNAME, rdata "mx" + ptr(17) => mx.example.com
        let rdata_at = buf.len() + 12;
        buf.extend_from_slice(&[
            0xC0, 12, 0x00, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3C, 0x00, 0x05, 2, b'm', b'x',
            0xC0, 17,
        ]);
        // answer 2: ptr(rdata_at) A 10.0.0.1
        buf.extend_from_slice(&[
            0xC0,
            rdata_at as u8,
            0x00,
            0x01,
            0x00,
            0x01,
            0x00,
            0x00,
            0x00,
            0x3C,
            0x00,
            0x04,
            10,
            0,
            0,
            1,
        ]);

        let msg = Message::decode(&buf).unwrap();
        assert_eq!(msg.answers.len(), 2);
        assert_eq!(msg.answers[0].name.to_string(), "mail.example.com");
        assert_eq!(
            msg.answers[0].data,
            RecordData::Name("mx.example.com".parse().unwrap())
        );
        assert_eq!(msg.answers[1].name.to_string(), "mx.example.com");
        assert_eq!(msg.answers[1].data, RecordData::A(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_decode_fails_when_counts_exceed_buffer() {
        let mut bytes = uncompressed_reply();
        // Claim a second answer that is not there.
        bytes[7] = 2;
        assert!(matches!(
            Message::decode(&bytes),
            Err(DecodeErrors::Truncated { .. })
        ));

        // rdata length past the end.
        let mut bytes = uncompressed_reply();
        let len_at = bytes.len() - 6;
        bytes[len_at + 1] = 40;
        assert!(Message::decode(&bytes).is_err());

        assert!(Message::decode(&[0x00, 0x01, 0x81]).is_err());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = uncompressed_reply();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        let msg = Message::decode(&bytes).unwrap();
        assert_eq!(msg.answers.len(), 1);
    }

    #[test]
    fn test_encode_writes_counts_from_sections() {
        let mut msg = Message::new(7, HeaderFlags::default());
        msg.header.an_count = 9;
        msg.questions
            .push(Question::new("example.com".parse().unwrap(), RecordType::Mx.code()));
        msg.answers.push(ResourceRecord::a(
            "example.com".parse().unwrap(),
            30,
            Ipv4Addr::LOCALHOST,
        ));

        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.header.qd_count, 1);
        assert_eq!(decoded.header.an_count, 1);
        assert_eq!(decoded.answers, msg.answers);

        msg.sync_counts().unwrap();
        assert_eq!(msg.header.an_count, 1);
    }

    #[test]
    fn test_record_data_variants() {
        let cname = ResourceRecord::cname(
            "www.example.com".parse().unwrap(),
            60,
            &"example.net".parse().unwrap(),
        )
        .unwrap();
        assert_eq!(cname.data.to_string(), "example.net");

        let mut mx = vec![0x00, 0x0A];
        "mail.example.com"
            .parse::<Name>()
            .unwrap()
            .encode(&mut mx)
            .unwrap();
        let len = mx.len();
        assert_eq!(
            RecordData::parse(RecordType::Mx.code(), &mx, 0, len).to_string(),
            "10 mail.example.com"
        );

        let txt = [3, b'a', b'b', b'c', 2, b'd', b'e'];
        assert_eq!(
            RecordData::parse(RecordType::Txt.code(), &txt, 0, txt.len()),
            RecordData::Txt(vec!["abc".into(), "de".into()])
        );

        // A record with the wrong length is kept opaque.
        assert_eq!(
            RecordData::parse(RecordType::A.code(), &[1, 2, 3], 0, 3),
            RecordData::Opaque(vec![1, 2, 3])
        );
    }
}
