//! Hash Commands: HSET, HGET, HDEL, HGETALL, HLEN

use crate::buffer::ByteBuffer;
use crate::commands::{entry_for_update, CommandEntry, CommandTable, WRONGTYPE_ERR};
use crate::protocol::types::{write_array_header, write_bulk, write_error, write_integer, write_null};
use crate::storage::object::{Value, ValueKind};
use crate::storage::Keyspace;
use bytes::Bytes;

pub fn register_all(table: &mut CommandTable) {
    table.register(CommandEntry {
        name: "HSET",
        arity: -4,
        is_write: true,
        handler: cmd_hset,
    });
    table.register(CommandEntry {
        name: "HGET",
        arity: 3,
        is_write: false,
        handler: cmd_hget,
    });
    table.register(CommandEntry {
        name: "HDEL",
        arity: -3,
        is_write: true,
        handler: cmd_hdel,
    });
    table.register(CommandEntry {
        name: "HGETALL",
        arity: 2,
        is_write: false,
        handler: cmd_hgetall,
    });
    table.register(CommandEntry {
        name: "HLEN",
        arity: 2,
        is_write: false,
        handler: cmd_hlen,
    });
}

/// HSET key field value [field value ...] — count of new fields.
fn cmd_hset(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    if (args.len() - 2) % 2 != 0 {
        write_error(out, "ERR wrong number of arguments for 'hset' command");
        return;
    }
    let Some(entry) = entry_for_update(ks, out, &args[1], ValueKind::Hash) else {
        return;
    };
    if let Value::Hash(map) = &mut entry.value {
        let mut added = 0;
        for pair in args[2..].chunks(2) {
            if map.insert(pair[0].clone(), pair[1].clone()).is_none() {
                added += 1;
            }
        }
        write_integer(out, added);
    }
}

/// HGET key field.
fn cmd_hget(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match &entry.value {
            Value::Hash(map) => match map.get(&args[2][..]) {
                Some(value) => write_bulk(out, value),
                None => write_null(out),
            },
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// HDEL key field [field ...] — count removed; deletes an emptied hash.
fn cmd_hdel(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let removed;
    let now_empty;
    match ks.find_entry(&args[1]) {
        None => {
            write_integer(out, 0);
            return;
        }
        Some(entry) => match &mut entry.value {
            Value::Hash(map) => {
                removed = args[2..]
                    .iter()
                    .filter(|field| map.remove(&field[..]).is_some())
                    .count();
                now_empty = map.is_empty();
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

/// HGETALL key — flat field/value array.
fn cmd_hgetall(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_array_header(out, 0),
        Some(entry) => match &entry.value {
            Value::Hash(map) => {
                write_array_header(out, (map.len() * 2) as i64);
                for (field, value) in map {
                    write_bulk(out, field);
                    write_bulk(out, value);
                }
            }
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// HLEN key — field count, `:0` for a missing key.
fn cmd_hlen(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::Hash(map) => write_integer(out, map.len() as i64),
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}
