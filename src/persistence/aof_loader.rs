//! Append-Log Replay
//!
//! At startup the log — a concatenation of wire frames — is read whole
//! into a byte buffer and fed through the normal parser and dispatcher
//! against the bootstrap keyspace, exactly as if a client had sent every
//! command again.
//!
//! Replies go to a null sink: a connection built over the write end of a
//! pipe whose read end is closed. Nothing is ever actually written to
//! it — the sink's outgoing buffer is drained after every dispatch so it
//! cannot grow without bound across a long replay.
//!
//! A crash mid-append leaves a truncated final frame; the parser reports
//! it as incomplete, and the loader keeps the valid prefix and logs the
//! truncation offset. A missing or empty file is a normal fresh start.

use crate::buffer::ByteBuffer;
use crate::commands::CommandTable;
use crate::net::Connection;
use crate::protocol::parse_frame;
use crate::storage::Keyspace;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

/// Replays the log at `path` into `ks`. Returns the number of commands
/// applied.
pub fn load(path: &Path, table: &CommandTable, ks: &mut Keyspace) -> usize {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no append log found, starting fresh");
            return 0;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read append log, starting fresh");
            return 0;
        }
    };
    if contents.is_empty() {
        info!(path = %path.display(), "append log is empty, starting fresh");
        return 0;
    }

    let file_size = contents.len();
    let mut buf = ByteBuffer::new();
    buf.append(&contents);

    let Some(mut sink) = null_sink() else {
        warn!("could not create replay sink, starting fresh");
        return 0;
    };

    let mut count = 0;
    while buf.readable_len() > 0 {
        let Some(args) = parse_frame(&mut buf) else {
            let remaining = buf.readable_len();
            warn!(
                offset = file_size - remaining,
                trailing_bytes = remaining,
                "append log truncated, loaded valid prefix"
            );
            break;
        };
        if args.is_empty() {
            continue;
        }

        table.dispatch(ks, sink.outgoing(), &args);

        // Keep the sink from accumulating a replay's worth of replies.
        let queued = sink.outgoing().readable_len();
        sink.outgoing().consume(queued);

        count += 1;
    }

    info!(path = %path.display(), commands = count, "append log loaded");
    count
}

/// A connection whose replies go nowhere: the write end of a pipe with
/// the read end already closed. The fd only exists so `Connection` has
/// something to own.
fn null_sink() -> Option<Connection> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return None;
    }
    unsafe { libc::close(fds[0]) };
    Some(Connection::new(fds[1]))
}
