//! String Commands: PING, SET, GET

use crate::buffer::ByteBuffer;
use crate::commands::{CommandEntry, CommandTable, WRONGTYPE_ERR};
use crate::protocol::types::{write_bulk, write_error, write_null, write_simple};
use crate::storage::Keyspace;
use bytes::Bytes;

pub fn register_all(table: &mut CommandTable) {
    table.register(CommandEntry {
        name: "PING",
        arity: -1,
        is_write: false,
        handler: cmd_ping,
    });
    table.register(CommandEntry {
        name: "SET",
        arity: 3,
        is_write: true,
        handler: cmd_set,
    });
    table.register(CommandEntry {
        name: "GET",
        arity: 2,
        is_write: false,
        handler: cmd_get,
    });
}

/// PING → `+PONG`; PING msg → echoes msg as a bulk string.
fn cmd_ping(_ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    if args.len() == 1 {
        write_simple(out, "PONG");
    } else {
        write_bulk(out, &args[1]);
    }
}

/// SET key value — upserts a string and clears any expiration.
fn cmd_set(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    ks.set_string(args[1].clone(), args[2].clone());
    write_simple(out, "OK");
}

/// GET key — bulk string, null when absent, WRONGTYPE for containers.
fn cmd_get(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match entry.value.string_projection() {
            Some(data) => write_bulk(out, &data),
            None => write_error(out, WRONGTYPE_ERR),
        },
    }
}
