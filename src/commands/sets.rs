//! Set Commands: SADD, SREM, SISMEMBER, SMEMBERS, SCARD

use crate::buffer::ByteBuffer;
use crate::commands::{entry_for_update, CommandEntry, CommandTable, WRONGTYPE_ERR};
use crate::protocol::types::{write_array_header, write_bulk, write_error, write_integer};
use crate::storage::object::{Value, ValueKind};
use crate::storage::Keyspace;
use bytes::Bytes;

pub fn register_all(table: &mut CommandTable) {
    table.register(CommandEntry {
        name: "SADD",
        arity: -3,
        is_write: true,
        handler: cmd_sadd,
    });
    table.register(CommandEntry {
        name: "SREM",
        arity: -3,
        is_write: true,
        handler: cmd_srem,
    });
    table.register(CommandEntry {
        name: "SISMEMBER",
        arity: 3,
        is_write: false,
        handler: cmd_sismember,
    });
    table.register(CommandEntry {
        name: "SMEMBERS",
        arity: 2,
        is_write: false,
        handler: cmd_smembers,
    });
    table.register(CommandEntry {
        name: "SCARD",
        arity: 2,
        is_write: false,
        handler: cmd_scard,
    });
}

/// SADD key member [member ...] — count of members actually added.
fn cmd_sadd(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let Some(entry) = entry_for_update(ks, out, &args[1], ValueKind::Set) else {
        return;
    };
    if let Value::Set(set) = &mut entry.value {
        let added = args[2..]
            .iter()
            .filter(|member| set.insert((*member).clone()))
            .count();
        write_integer(out, added as i64);
    }
}

/// SREM key member [member ...] — count removed; deletes an emptied set.
fn cmd_srem(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let removed;
    let now_empty;
    match ks.find_entry(&args[1]) {
        None => {
            write_integer(out, 0);
            return;
        }
        Some(entry) => match &mut entry.value {
            Value::Set(set) => {
                removed = args[2..]
                    .iter()
                    .filter(|member| set.remove(&member[..]))
                    .count();
                now_empty = set.is_empty();
            }
            _ => {
                write_error(out, WRONGTYPE_ERR);
                return;
            }
        },
    }
    if now_empty {
        ks.del(&args[1]);
    }
    write_integer(out, removed as i64);
}

/// SISMEMBER key member — `:1` or `:0`.
fn cmd_sismember(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::Set(set) => write_integer(out, i64::from(set.contains(&args[2][..]))),
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// SMEMBERS key — all members, unordered.
fn cmd_smembers(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_array_header(out, 0),
        Some(entry) => match &entry.value {
            Value::Set(set) => {
                write_array_header(out, set.len() as i64);
                for member in set {
                    write_bulk(out, member);
                }
            }
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// SCARD key — cardinality, `:0` for a missing key.
fn cmd_scard(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::Set(set) => write_integer(out, set.len() as i64),
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}
