//! Reply Serialization
//!
//! The wire protocol uses five reply kinds, each introduced by a one-byte
//! prefix and terminated by CRLF:
//!
//! - `+` simple string: `+OK\r\n`
//! - `-` error: `-ERR unknown command\r\n`
//! - `:` signed integer: `:1000\r\n`
//! - `$` bulk string: `$5\r\nhello\r\n`, null as `$-1\r\n`
//! - `*` array header: `*2\r\n` followed by the member encodings
//!
//! Replies are written directly into a connection's outgoing
//! [`ByteBuffer`](crate::buffer::ByteBuffer) — command handlers stream an
//! array header and then its members rather than building an intermediate
//! tree. Bulk strings are binary-safe: the length prefix drives the
//! reader, so payloads may contain `\r`, `\n`, or `\0`.

use crate::buffer::ByteBuffer;

/// The CRLF terminator used throughout the protocol.
pub const CRLF: &[u8] = b"\r\n";

/// Reply and request type prefixes.
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Writes a simple string reply: `+s\r\n`.
pub fn write_simple(out: &mut ByteBuffer, s: &str) {
    out.append(&[prefix::SIMPLE_STRING]);
    out.append(s.as_bytes());
    out.append(CRLF);
}

/// Writes an error reply: `-msg\r\n`.
pub fn write_error(out: &mut ByteBuffer, msg: &str) {
    out.append(&[prefix::ERROR]);
    out.append(msg.as_bytes());
    out.append(CRLF);
}

/// Writes an integer reply: `:n\r\n`.
pub fn write_integer(out: &mut ByteBuffer, n: i64) {
    out.append(&[prefix::INTEGER]);
    out.append(n.to_string().as_bytes());
    out.append(CRLF);
}

/// Writes a bulk string reply: `$len\r\ndata\r\n`.
pub fn write_bulk(out: &mut ByteBuffer, data: &[u8]) {
    out.append(&[prefix::BULK_STRING]);
    out.append(data.len().to_string().as_bytes());
    out.append(CRLF);
    out.append(data);
    out.append(CRLF);
}

/// Writes a null bulk string: `$-1\r\n`.
pub fn write_null(out: &mut ByteBuffer) {
    out.append(b"$-1\r\n");
}

/// Writes an array header: `*count\r\n`. The caller writes the members.
pub fn write_array_header(out: &mut ByteBuffer, count: i64) {
    out.append(&[prefix::ARRAY]);
    out.append(count.to_string().as_bytes());
    out.append(CRLF);
}
