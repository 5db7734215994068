//! Key Commands: DEL, EXISTS, KEYS, EXPIRE, TTL, PEXPIRE, PTTL, DBSIZE

use crate::buffer::ByteBuffer;
use crate::commands::{parse_int, CommandEntry, CommandTable, NOT_INTEGER_ERR};
use crate::protocol::types::{write_array_header, write_bulk, write_error, write_integer};
use crate::storage::keyspace::now_ms;
use crate::storage::Keyspace;
use bytes::Bytes;

pub fn register_all(table: &mut CommandTable) {
    table.register(CommandEntry {
        name: "DEL",
        arity: -2,
        is_write: true,
        handler: cmd_del,
    });
    table.register(CommandEntry {
        name: "EXISTS",
        arity: -2,
        is_write: false,
        handler: cmd_exists,
    });
    table.register(CommandEntry {
        name: "KEYS",
        arity: 2,
        is_write: false,
        handler: cmd_keys,
    });
    table.register(CommandEntry {
        name: "EXPIRE",
        arity: 3,
        is_write: true,
        handler: cmd_expire,
    });
    table.register(CommandEntry {
        name: "TTL",
        arity: 2,
        is_write: false,
        handler: cmd_ttl,
    });
    table.register(CommandEntry {
        name: "PEXPIRE",
        arity: 3,
        is_write: true,
        handler: cmd_pexpire,
    });
    table.register(CommandEntry {
        name: "PTTL",
        arity: 2,
        is_write: false,
        handler: cmd_pttl,
    });
    table.register(CommandEntry {
        name: "DBSIZE",
        arity: 1,
        is_write: false,
        handler: cmd_dbsize,
    });
}

/// DEL key [key ...] — count of keys actually removed.
fn cmd_del(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let mut removed = 0;
    for key in &args[1..] {
        if ks.del(key) {
            removed += 1;
        }
    }
    write_integer(out, removed);
}

/// EXISTS key [key ...] — count of keys present.
fn cmd_exists(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let mut present = 0;
    for key in &args[1..] {
        if ks.exists(key) {
            present += 1;
        }
    }
    write_integer(out, present);
}

/// KEYS pattern — the pattern argument is accepted syntactically; only
/// the literal `*` is meaningful, and it matches everything.
fn cmd_keys(ks: &mut Keyspace, out: &mut ByteBuffer, _args: &[Bytes]) {
    let keys = ks.keys();
    write_array_header(out, keys.len() as i64);
    for key in keys {
        write_bulk(out, &key);
    }
}

/// EXPIRE key seconds — `:1` when the deadline was set, `:0` otherwise.
fn cmd_expire(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let Some(seconds) = parse_int(&args[2]) else {
        write_error(out, NOT_INTEGER_ERR);
        return;
    };
    let deadline = now_ms().saturating_add(seconds.saturating_mul(1000));
    write_integer(out, i64::from(ks.set_expire(&args[1], deadline)));
}

/// PEXPIRE key milliseconds.
fn cmd_pexpire(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let Some(millis) = parse_int(&args[2]) else {
        write_error(out, NOT_INTEGER_ERR);
        return;
    };
    let deadline = now_ms().saturating_add(millis);
    write_integer(out, i64::from(ks.set_expire(&args[1], deadline)));
}

/// TTL key — remaining whole seconds, `:-1` without a deadline, `:-2`
/// when the key is absent.
fn cmd_ttl(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let remaining = ks.ttl(&args[1]);
    if remaining < 0 {
        write_integer(out, remaining);
    } else {
        write_integer(out, remaining / 1000);
    }
}

/// PTTL key — same as TTL, in milliseconds.
fn cmd_pttl(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    write_integer(out, ks.ttl(&args[1]));
}

/// DBSIZE — live key count.
fn cmd_dbsize(ks: &mut Keyspace, out: &mut ByteBuffer, _args: &[Bytes]) {
    write_integer(out, ks.dbsize() as i64);
}
