use std::fmt::Debug;

use serde::Serialize;

use crate::dns::{RecordData, RecordType, ResourceRecord};

/// One answer record matched to the query that asked for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discovery {
    /// Candidate name as it was queried.
    pub query: String,
    pub query_type: String,
    /// Owner name of the answer record.
    pub name: String,
    pub record_type: String,
    pub ttl: u32,
    pub data: RecordData,
}

impl Discovery {
    pub fn new(query: &str, qtype: u16, record: &ResourceRecord) -> Self {
        Self {
            query: query.to_string(),
            query_type: RecordType::describe(qtype),
            name: record.name.to_string(),
            record_type: RecordType::describe(record.rtype),
            ttl: record.ttl,
            data: record.data.clone(),
        }
    }
}

/// Turns a [`Discovery`] into whatever the consumer of the event stream wants.
pub trait LogFormatter: Send + Sync + 'static {
    type Output: Send + Sync + 'static + Clone + Debug;

    fn format(&self, discovery: Discovery) -> Self::Output;
}

/// One line per record: `name (IP = a.b.c.d)` for addresses,
/// `name (NAME = target)` for aliases, the bare name otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;
/// Keeps the [`Discovery`] as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredFormatter;
/// One JSON object per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl LogFormatter for PlainFormatter {
    type Output = String;

    fn format(&self, discovery: Discovery) -> Self::Output {
        match &discovery.data {
            RecordData::A(ip) => format!("{} (IP = {})", discovery.name, ip),
            RecordData::Aaaa(ip) => format!("{} (IP = {})", discovery.name, ip),
            RecordData::Name(target) if discovery.record_type == RecordType::Cname.name() => {
                format!("{} (NAME = {})", discovery.name, target)
            }
            _ => discovery.name,
        }
    }
}

impl LogFormatter for StructuredFormatter {
    type Output = Discovery;

    fn format(&self, discovery: Discovery) -> Self::Output {
        discovery
    }
}

impl LogFormatter for JsonFormatter {
    type Output = String;

    fn format(&self, discovery: Discovery) -> Self::Output {
        serde_json::to_string(&discovery)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}
