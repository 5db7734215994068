//! Command Layer
//!
//! One module per command family, each registering its handlers into the
//! [`CommandTable`]. Handlers receive the shared [`Keyspace`], the
//! connection's outgoing buffer, and the full argument vector (command
//! name included, so indices match the wire frame).
//!
//! Handler contract:
//! - validate the target key's type through the keyspace accessors; on a
//!   mismatch, write a `WRONGTYPE` error and mutate nothing
//! - when a mutation empties a container, delete the enclosing key
//! - never touch the append log — the server feeds it from the
//!   dispatcher's verdict after a successful write command

pub mod hashes;
pub mod keys;
pub mod lists;
pub mod sets;
pub mod strings;
pub mod table;
pub mod zsets;

pub use table::{CommandEntry, CommandTable};

use crate::buffer::ByteBuffer;
use crate::protocol::types::write_error;
use crate::storage::hash_table::Entry;
use crate::storage::object::{Value, ValueKind};
use crate::storage::Keyspace;
use bytes::Bytes;

pub(crate) const WRONGTYPE_ERR: &str =
    "WRONGTYPE Operation against a key holding the wrong kind of value";
pub(crate) const NOT_INTEGER_ERR: &str = "ERR value is not an integer or out of range";
pub(crate) const NOT_FLOAT_ERR: &str = "ERR value is not a valid float";

/// Parses an argument as a signed 64-bit decimal integer.
pub(crate) fn parse_int(data: &[u8]) -> Option<i64> {
    std::str::from_utf8(data).ok()?.parse().ok()
}

/// Parses an argument as a finite-or-infinite double. NaN is rejected so
/// the ordered index never sees an incomparable score.
pub(crate) fn parse_score(data: &[u8]) -> Option<f64> {
    let score: f64 = std::str::from_utf8(data).ok()?.trim().parse().ok()?;
    if score.is_nan() {
        return None;
    }
    Some(score)
}

/// Looks up `key` expecting a value of `kind`, creating an empty one when
/// the key is absent. On a type mismatch, writes the `WRONGTYPE` reply
/// and returns `None`. This is the shared front half of every container
/// upsert command.
pub(crate) fn entry_for_update<'a>(
    ks: &'a mut Keyspace,
    out: &mut ByteBuffer,
    key: &Bytes,
    kind: ValueKind,
) -> Option<&'a mut Entry> {
    enum Lookup {
        Missing,
        Matched,
        Mismatched,
    }
    let lookup = match ks.find_entry(key) {
        None => Lookup::Missing,
        Some(entry) if entry.value.kind() == kind => Lookup::Matched,
        Some(_) => Lookup::Mismatched,
    };
    match lookup {
        Lookup::Mismatched => {
            write_error(out, WRONGTYPE_ERR);
            None
        }
        Lookup::Missing => {
            let empty = match kind {
                ValueKind::List => Value::empty_list(),
                ValueKind::Hash => Value::empty_hash(),
                ValueKind::Set => Value::empty_set(),
                ValueKind::ZSet => Value::empty_zset(),
                ValueKind::Str => Value::string(Bytes::new()),
            };
            ks.set_object(key.clone(), empty);
            ks.find_entry(key)
        }
        Lookup::Matched => ks.find_entry(key),
    }
}
