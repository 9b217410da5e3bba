//! # Input Sanitization
//!
//! Turns the raw lists a user hands over (wordlists, base domains, resolver
//! files) into the clean values the scanner expects.
//!
//! - [`clean_lines`] trims, drops blank lines and removes duplicates while
//!   keeping the first occurrence.
//! - [`candidate_names`] crosses words with domains into `word.domain` names,
//!   skipping any that could not be sent as a DNS name.
//! - [`parse_resolver`] / [`parse_resolvers`] read `a.b.c.d` or
//!   `a.b.c.d:port` entries. IPv6 resolvers are not supported.
//!
//! ## Example
//! ```rust
//! use subsweep::utils::{candidate_names, clean_lines, parse_resolvers};
//!
//! let words = clean_lines("www\nmail\n\nwww\n");
//! let domains = clean_lines("example.com");
//! let names = candidate_names(&words, &domains).unwrap();
//! assert_eq!(names, vec!["www.example.com", "mail.example.com"]);
//!
//! let resolvers = parse_resolvers(&clean_lines("1.1.1.1\n8.8.8.8:5353")).unwrap();
//! assert_eq!(resolvers[0].port(), 53);
//! assert_eq!(resolvers[1].port(), 5353);
//! ```
use std::{
    collections::HashSet,
    net::{Ipv4Addr, SocketAddrV4},
};

use tracing::warn;

use crate::{config::ConfigErrors, dns::Name};

/// Default DNS port for resolver entries without one.
pub const DNS_PORT: u16 = 53;

/// Trimmed, non-empty, de-duplicated lines of `input`, in first-seen order.
pub fn clean_lines(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}

/// Every `word.domain` pair, domain-major, de-duplicated.
///
/// A candidate that is not a valid DNS name (empty label, label over 63
/// bytes, name over 255 bytes) is skipped with a warning rather than
/// failing the whole list.
pub fn candidate_names(words: &[String], domains: &[String]) -> Result<Vec<String>, ConfigErrors> {
    if domains.is_empty() {
        return Err(ConfigErrors::NoDomains);
    }
    if words.is_empty() {
        return Err(ConfigErrors::NoWordlist);
    }

    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(words.len() * domains.len());

    for domain in domains {
        let domain = domain.trim_end_matches('.');
        for word in words {
            let candidate = format!("{}.{}", word.trim_end_matches('.'), domain);

            if let Err(e) = candidate.parse::<Name>() {
                warn!(candidate = %candidate, error = %e, "skipping candidate");
                continue;
            }
            if seen.insert(candidate.to_ascii_lowercase()) {
                names.push(candidate);
            }
        }
    }

    if names.is_empty() {
        return Err(ConfigErrors::NoCandidates);
    }
    Ok(names)
}

/// Parses one resolver entry: `a.b.c.d` (port 53) or `a.b.c.d:port`.
pub fn parse_resolver(entry: &str) -> Result<SocketAddrV4, ConfigErrors> {
    let entry = entry.trim();

    if let Ok(ip) = entry.parse::<Ipv4Addr>() {
        return Ok(SocketAddrV4::new(ip, DNS_PORT));
    }
    match entry.parse::<SocketAddrV4>() {
        Ok(addr) if addr.port() != 0 => Ok(addr),
        _ => Err(ConfigErrors::InvalidResolver(entry.to_string())),
    }
}

/// Parses every entry, failing on the first invalid one.
pub fn parse_resolvers(entries: &[String]) -> Result<Vec<SocketAddrV4>, ConfigErrors> {
    let mut seen = HashSet::new();
    let mut resolvers = Vec::with_capacity(entries.len());

    for entry in entries {
        let addr = parse_resolver(entry)?;
        if seen.insert(addr) {
            resolvers.push(addr);
        }
    }

    if resolvers.is_empty() {
        return Err(ConfigErrors::NoResolvers);
    }
    Ok(resolvers)
}
