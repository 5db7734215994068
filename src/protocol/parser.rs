//! Request Frame Parser
//!
//! Extracts one complete command frame from a [`ByteBuffer`]. Two framings
//! are accepted:
//!
//! 1. **Array of bulk strings** — `*N\r\n` followed by N elements of the
//!    form `$len\r\n<len bytes>\r\n`. This is what real clients send.
//!    Payload bytes are read by length, never by scanning, so arguments
//!    are fully binary-safe.
//! 2. **Inline command** — any line not starting with `*`, terminated by
//!    CRLF and split on spaces. Handy for `telnet`-style debugging.
//!
//! ## The No-Partial-Consumption Contract
//!
//! TCP delivers byte streams, not messages: a frame may arrive in pieces,
//! and several pipelined frames may arrive in one read. The parser
//! therefore never consumes bytes unless a complete frame was extracted.
//! On incomplete input it returns `None` and leaves the buffer exactly as
//! it found it; the caller retries after the next read. Malformed input
//! is reported the same way — the read loop simply accumulates more bytes
//! and the connection-level machinery decides when enough is enough.

use crate::buffer::ByteBuffer;
use bytes::Bytes;

/// Attempts to parse one complete command frame from the buffer.
///
/// Returns the argument vector and consumes the frame's bytes, or returns
/// `None` (buffer untouched) when no complete frame is available. A null
/// array (`*-1\r\n`) parses as an empty argument vector.
pub fn parse_frame(buf: &mut ByteBuffer) -> Option<Vec<Bytes>> {
    let data = buf.readable();
    if data.is_empty() {
        return None;
    }

    let (args, consumed) = if data[0] == b'*' {
        parse_array(data)?
    } else {
        parse_inline(data)?
    };

    // Only a complete frame reaches this point.
    buf.consume(consumed);
    Some(args)
}

/// Finds `\r\n` in `data` at or after `offset`. Returns the index of `\r`.
fn find_crlf(data: &[u8], offset: usize) -> Option<usize> {
    if data.len() < offset + 2 {
        return None;
    }
    (offset..data.len() - 1).find(|&i| data[i] == b'\r' && data[i + 1] == b'\n')
}

/// Parses the decimal integer between `start` and `end` (exclusive).
fn parse_decimal(data: &[u8], start: usize, end: usize) -> Option<i64> {
    std::str::from_utf8(&data[start..end]).ok()?.parse().ok()
}

/// Parses `*N\r\n` followed by N bulk strings. Returns the argument
/// vector and the frame's total wire length.
fn parse_array(data: &[u8]) -> Option<(Vec<Bytes>, usize)> {
    let count_end = find_crlf(data, 1)?;
    let count = parse_decimal(data, 1, count_end)?;

    if count < 0 {
        // Null array — an empty command, consumed and ignored upstream.
        return Some((Vec::new(), count_end + 2));
    }

    let mut pos = count_end + 2;
    let mut args = Vec::with_capacity(count as usize);

    for _ in 0..count {
        if pos >= data.len() {
            return None;
        }
        if data[pos] != b'$' {
            return None;
        }

        let len_end = find_crlf(data, pos + 1)?;
        let bulk_len = parse_decimal(data, pos + 1, len_end)?;

        if bulk_len < 0 {
            // $-1\r\n = null bulk string; represented as an empty argument.
            args.push(Bytes::new());
            pos = len_end + 2;
            continue;
        }

        let payload_start = len_end + 2;
        let payload_end = payload_start + bulk_len as usize;

        // Payload plus its trailing CRLF must be fully buffered.
        if payload_end + 2 > data.len() {
            return None;
        }
        if data[payload_end] != b'\r' || data[payload_end + 1] != b'\n' {
            return None;
        }

        args.push(Bytes::copy_from_slice(&data[payload_start..payload_end]));
        pos = payload_end + 2;
    }

    Some((args, pos))
}

/// Parses one CRLF-terminated line and splits it on spaces.
fn parse_inline(data: &[u8]) -> Option<(Vec<Bytes>, usize)> {
    let line_end = find_crlf(data, 0)?;
    let args = data[..line_end]
        .split(|&b| b == b' ')
        .filter(|token| !token.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();
    Some((args, line_end + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8]) -> ByteBuffer {
        let mut buf = ByteBuffer::new();
        buf.append(bytes);
        buf
    }

    fn args(strs: &[&str]) -> Vec<Bytes> {
        strs.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect()
    }

    #[test]
    fn test_parse_array_command() {
        let mut buf = buffer_with(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
        assert_eq!(parse_frame(&mut buf), Some(args(&["GET", "name"])));
        assert_eq!(buf.readable_len(), 0);
    }

    #[test]
    fn test_incomplete_leaves_buffer_untouched() {
        let wire = b"*2\r\n$3\r\nGET\r\n$4\r\nna";
        let mut buf = buffer_with(wire);
        assert_eq!(parse_frame(&mut buf), None);
        assert_eq!(buf.readable(), wire);
    }

    #[test]
    fn test_incomplete_header() {
        let mut buf = buffer_with(b"*2\r");
        assert_eq!(parse_frame(&mut buf), None);
        assert_eq!(buf.readable(), b"*2\r");
    }

    #[test]
    fn test_pipelined_frames_parse_one_at_a_time() {
        let mut buf =
            buffer_with(b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*2\r\n$3\r\nGET\r\n$1\r\na\r\n");
        assert_eq!(parse_frame(&mut buf), Some(args(&["SET", "a", "1"])));
        assert_eq!(parse_frame(&mut buf), Some(args(&["GET", "a"])));
        assert_eq!(parse_frame(&mut buf), None);
        assert_eq!(buf.readable_len(), 0);
    }

    #[test]
    fn test_binary_safe_payload() {
        // The payload contains CRLF and NUL; the length prefix drives
        // parsing, so none of that matters.
        let mut buf = buffer_with(b"*2\r\n$3\r\nGET\r\n$5\r\na\r\n\0b\r\n");
        let parsed = parse_frame(&mut buf).unwrap();
        assert_eq!(parsed[1], Bytes::copy_from_slice(b"a\r\n\0b"));
    }

    #[test]
    fn test_null_array_is_empty_command() {
        let mut buf = buffer_with(b"*-1\r\n");
        assert_eq!(parse_frame(&mut buf), Some(vec![]));
        assert_eq!(buf.readable_len(), 0);
    }

    #[test]
    fn test_null_bulk_element() {
        let mut buf = buffer_with(b"*2\r\n$3\r\nGET\r\n$-1\r\n");
        assert_eq!(
            parse_frame(&mut buf),
            Some(vec![Bytes::copy_from_slice(b"GET"), Bytes::new()])
        );
    }

    #[test]
    fn test_inline_command() {
        let mut buf = buffer_with(b"SET greeting hello\r\n");
        assert_eq!(parse_frame(&mut buf), Some(args(&["SET", "greeting", "hello"])));
    }

    #[test]
    fn test_inline_command_collapses_spaces() {
        let mut buf = buffer_with(b"  PING   pong  \r\n");
        assert_eq!(parse_frame(&mut buf), Some(args(&["PING", "pong"])));
    }

    #[test]
    fn test_inline_without_terminator_is_incomplete() {
        let mut buf = buffer_with(b"PING");
        assert_eq!(parse_frame(&mut buf), None);
        assert_eq!(buf.readable(), b"PING");
    }

    #[test]
    fn test_malformed_bulk_reports_not_yet() {
        // Declared three bytes but the terminator is misplaced; the parser
        // waits for more input rather than consuming garbage.
        let wire = b"*1\r\n$3\r\nabXY";
        let mut buf = buffer_with(wire);
        assert_eq!(parse_frame(&mut buf), None);
        assert_eq!(buf.readable(), wire);
    }

    #[test]
    fn test_empty_buffer() {
        let mut buf = ByteBuffer::new();
        assert_eq!(parse_frame(&mut buf), None);
    }

    #[test]
    fn test_serialize_then_parse_round_trip() {
        use crate::protocol::types::{write_array_header, write_bulk};

        let payload: Vec<u8> = (0u8..=255).collect();
        let mut buf = ByteBuffer::new();
        write_array_header(&mut buf, 2);
        write_bulk(&mut buf, b"ECHOISH");
        write_bulk(&mut buf, &payload);

        let parsed = parse_frame(&mut buf).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].as_ref(), &payload[..]);
        assert_eq!(buf.readable_len(), 0);
    }

    #[test]
    fn test_byte_by_byte_arrival() {
        // Feed a frame one byte at a time; the parser must return None for
        // every proper prefix and succeed exactly at the end.
        let wire = b"*2\r\n$4\r\nLPOP\r\n$1\r\nk\r\n";
        let mut buf = ByteBuffer::new();
        for &b in &wire[..wire.len() - 1] {
            buf.append(&[b]);
            assert_eq!(parse_frame(&mut buf), None);
        }
        buf.append(&[wire[wire.len() - 1]]);
        assert_eq!(parse_frame(&mut buf), Some(args(&["LPOP", "k"])));
    }
}
