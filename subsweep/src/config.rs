//! Run configuration.
//!
//! [`ScannerOptions`] deserialises from any serde format with every field
//! defaulted, so a TOML file only needs the keys it changes:
//!
//! ```rust
//! use subsweep::config::ScannerOptions;
//! use subsweep::dns::RecordType;
//!
//! let opts: ScannerOptions = serde_json::from_str(r#"{ "qps": 500, "record_types": ["A", "cname"] }"#).unwrap();
//! assert_eq!(opts.qps, 500);
//! assert_eq!(opts.record_types, vec![RecordType::A, RecordType::Cname]);
//! assert_eq!(opts.timeout_secs, 0.5);
//! ```
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dns::{RecordType, UnknownRecordType};

/// Configuration problems, all raised before any packet is sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigErrors {
    #[error("no base domain given")]
    NoDomains,

    #[error("the wordlist is empty")]
    NoWordlist,

    #[error("no valid candidate name to query")]
    NoCandidates,

    #[error("the resolver list is empty")]
    NoResolvers,

    #[error("invalid resolver '{0}', expected an IPv4 address with an optional port")]
    InvalidResolver(String),

    #[error("at least one record type is required")]
    NoRecordTypes,

    #[error(transparent)]
    UnknownRecordType(#[from] UnknownRecordType),

    #[error("qps must be greater than zero")]
    ZeroQps,

    #[error("timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),

    #[error("progress interval must be a positive number of seconds, got {0}")]
    InvalidProgressInterval(f64),

    #[error("send_attempts must be greater than zero")]
    ZeroSendAttempts,

    #[error("max_attempts must be greater than zero when set")]
    ZeroMaxAttempts,
}

/// Tunables of a scan.
///
/// # Defaults
/// ```rust,ignore
/// ScannerOptions {
///     record_types: vec![RecordType::A],
///     timeout_secs: 0.5,
///     qps: 2000,
///     print_stats: true,
///     max_attempts: None,
///     send_attempts: 8,
///     progress_interval_secs: 15.0,
///     recv_buffer_bytes: 256 * 1024,
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerOptions {
    /// Types queried for every candidate.
    pub record_types: Vec<RecordType>,
    /// Seconds without a reply before a query is sent again.
    pub timeout_secs: f64,
    /// Ceiling on datagrams sent per second, retries included.
    pub qps: u32,
    /// Emit progress events.
    pub print_stats: bool,
    /// Give up on a query after this many unanswered sends. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Sockets tried for one datagram before the send counts as failed.
    pub send_attempts: u32,
    pub progress_interval_secs: f64,
    /// Requested `SO_RCVBUF` for each resolver socket.
    pub recv_buffer_bytes: usize,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            record_types: vec![RecordType::A],
            timeout_secs: 0.5,
            qps: 2000,
            print_stats: true,
            max_attempts: None,
            send_attempts: 8,
            progress_interval_secs: 15.0,
            recv_buffer_bytes: 256 * 1024,
        }
    }
}

impl ScannerOptions {
    pub fn validate(&self) -> Result<(), ConfigErrors> {
        if self.record_types.is_empty() {
            return Err(ConfigErrors::NoRecordTypes);
        }
        if self.qps == 0 {
            return Err(ConfigErrors::ZeroQps);
        }
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(ConfigErrors::InvalidTimeout(self.timeout_secs));
        }
        if !(self.progress_interval_secs.is_finite() && self.progress_interval_secs > 0.0) {
            return Err(ConfigErrors::InvalidProgressInterval(
                self.progress_interval_secs,
            ));
        }
        if self.send_attempts == 0 {
            return Err(ConfigErrors::ZeroSendAttempts);
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigErrors::ZeroMaxAttempts);
        }
        Ok(())
    }

    /// Only meaningful once [`validate`](Self::validate) has passed.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs_f64(self.progress_interval_secs)
    }

    pub fn type_codes(&self) -> Vec<u16> {
        self.record_types.iter().map(|t| t.code()).collect()
    }
}
