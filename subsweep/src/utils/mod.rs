//! Helpers shared by the library and the command line front end.
pub mod sanitize;
pub use sanitize::{DNS_PORT, candidate_names, clean_lines, parse_resolver, parse_resolvers};
