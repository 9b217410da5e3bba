pub mod mock_resolver;
pub use mock_resolver::{MockResolver, a_reply, cname_reply, malformed_reply, reply};
