//! # Subsweep
//!
//! A fast DNS subdomain discovery engine. Given a wordlist and one or more
//! base domains, it queries every `word.domain` candidate for the requested
//! record types across a pool of UDP resolvers, under a global
//! queries-per-second ceiling, and reports every answer it gets back.
//!
//! ## Features
//!
//! (All feature versions)
//! - **DNS wire codec** - RFC 1035 messages with compression pointer decoding,
//!   hardened against truncated input and pointer loops
//! - **Query builder** - single-question recursive queries with random ids
//! - **Input sanitization** - wordlist, domain and resolver list cleaning
//!
//! ("tokio-dep" feature, default)
//! - **Resolver pool** - one connected UDP socket per resolver
//! - **Scanner** - rate-limited dispatch, timeout-driven retries and reply
//!   matching, streamed as [`scanner::ScanEvent`]s
//!
//! ## Feature Variants
//!
//! - **Codec only** (`default-features = false`)
//!   - Only parsing, encoding and decoding of DNS messages, plus helpers.
//!   - No executor or transport included.
//!
//! - **Tokio** (`tokio-dep`)
//!   - Adds the resolver pool and the scanner on top of `tokio::net`.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! subsweep = "0.1"
//! subsweep = { version = "0.1", default-features = false }
//! ```
//!
//! ### Decoding a reply
//!
//! ```rust
//! use subsweep::dns::{Message, RecordData};
//!
//! let reply: &[u8] = &[
//!     0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
//!     3, b'w', b'w', b'w', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0,
//!     0x00, 0x01, 0x00, 0x01,
//!     0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x0E, 0x10, 0x00, 0x04,
//!     93, 184, 216, 34,
//! ];
//!
//! let msg = Message::decode(reply).unwrap();
//! assert_eq!(msg.answers[0].name.to_string(), "www.example.com");
//! assert_eq!(msg.answers[0].data, RecordData::A([93, 184, 216, 34].into()));
//! ```
//!
//! ### Running a scan
//!
//! ```rust,no_run
//! # #[cfg(feature = "tokio-dep")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use subsweep::scanner::{PlainFormatter, ScanEvent, Scanner};
//! use subsweep::utils::{candidate_names, clean_lines, parse_resolvers};
//! use tokio_stream::StreamExt;
//!
//! let names = candidate_names(&clean_lines("www\nmail"), &clean_lines("example.com"))?;
//! let resolvers = parse_resolvers(&clean_lines("1.1.1.1\n9.9.9.9"))?;
//!
//! let (mut events, handle) = Scanner::<PlainFormatter>::new(names, resolvers)
//!     .build()
//!     .await?
//!     .spawn();
//!
//! while let Some(event) = events.next().await {
//!     if let ScanEvent::Record(line) = event {
//!         println!("{line}");
//!     }
//! }
//! println!("{}", handle.await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`dns`** - wire codec and query builder
//! - **`config`** - [`config::ScannerOptions`] and configuration errors
//! - **`utils`** - input list sanitization
//! - **`transport`** - resolver sockets and the datagram channel
//! - **`scanner`** - the dispatch, retry and match loop
//!
//! ## License
//!
//! This project is licensed under the MIT License.

pub mod config;

pub mod dns;

pub mod utils;

cfg_if::cfg_if! {
    if #[cfg(feature = "tokio-dep")] {
        pub mod scanner;
        pub mod transport;
    }
}
