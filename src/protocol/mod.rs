//! Wire Protocol
//!
//! Length-prefixed, binary-safe framing in both directions:
//!
//! - `parser`: extracts complete request frames from a byte buffer,
//!   consuming nothing on partial input
//! - `types`: serializes the five typed reply kinds onto a byte buffer
//!
//! The protocol layer knows nothing about commands, the keyspace, or
//! sockets — it moves between bytes and argument vectors, full stop.

pub mod parser;
pub mod types;

pub use parser::parse_frame;
pub use types::{
    write_array_header, write_bulk, write_error, write_integer, write_null, write_simple, CRLF,
};
