//! List Commands: LPUSH, RPUSH, LPOP, RPOP, LLEN, LRANGE
//!
//! Lists are deques of byte strings. A pop that empties the list deletes
//! the enclosing key — container values are never empty.

use crate::buffer::ByteBuffer;
use crate::commands::{entry_for_update, parse_int, CommandEntry, CommandTable};
use crate::commands::{NOT_INTEGER_ERR, WRONGTYPE_ERR};
use crate::protocol::types::{write_array_header, write_bulk, write_error, write_integer, write_null};
use crate::storage::object::{Value, ValueKind};
use crate::storage::Keyspace;
use bytes::Bytes;

pub fn register_all(table: &mut CommandTable) {
    table.register(CommandEntry {
        name: "LPUSH",
        arity: -3,
        is_write: true,
        handler: cmd_lpush,
    });
    table.register(CommandEntry {
        name: "RPUSH",
        arity: -3,
        is_write: true,
        handler: cmd_rpush,
    });
    table.register(CommandEntry {
        name: "LPOP",
        arity: 2,
        is_write: true,
        handler: cmd_lpop,
    });
    table.register(CommandEntry {
        name: "RPOP",
        arity: 2,
        is_write: true,
        handler: cmd_rpop,
    });
    table.register(CommandEntry {
        name: "LLEN",
        arity: 2,
        is_write: false,
        handler: cmd_llen,
    });
    table.register(CommandEntry {
        name: "LRANGE",
        arity: 4,
        is_write: false,
        handler: cmd_lrange,
    });
}

/// LPUSH key value [value ...] — new length of the list.
fn cmd_lpush(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let Some(entry) = entry_for_update(ks, out, &args[1], ValueKind::List) else {
        return;
    };
    if let Value::List(list) = &mut entry.value {
        for value in &args[2..] {
            list.push_front(value.clone());
        }
        write_integer(out, list.len() as i64);
    }
}

/// RPUSH key value [value ...] — new length of the list.
fn cmd_rpush(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let Some(entry) = entry_for_update(ks, out, &args[1], ValueKind::List) else {
        return;
    };
    if let Value::List(list) = &mut entry.value {
        for value in &args[2..] {
            list.push_back(value.clone());
        }
        write_integer(out, list.len() as i64);
    }
}

fn pop_end(ks: &mut Keyspace, out: &mut ByteBuffer, key: &Bytes, front: bool) {
    let popped;
    let now_empty;
    match ks.find_entry(key) {
        None => {
            write_null(out);
            return;
        }
        Some(entry) => match &mut entry.value {
            Value::List(list) => {
                let taken = if front {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                match taken {
                    Some(value) => {
                        now_empty = list.is_empty();
                        popped = value;
                    }
                    None => {
                        write_null(out);
                        return;
                    }
                }
            }
            _ => {
                write_error(out, WRONGTYPE_ERR);
                return;
            }
        },
    }
    if now_empty {
        ks.del(key);
    }
    write_bulk(out, &popped);
}

/// LPOP key — removes and returns the head element.
fn cmd_lpop(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    pop_end(ks, out, &args[1], true);
}

/// RPOP key — removes and returns the tail element.
fn cmd_rpop(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    pop_end(ks, out, &args[1], false);
}

/// LLEN key — list length, `:0` for a missing key.
fn cmd_llen(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::List(list) => write_integer(out, list.len() as i64),
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// LRANGE key start stop — inclusive range; negative indices count from
/// the tail and out-of-range bounds clamp silently.
fn cmd_lrange(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let (Some(start), Some(stop)) = (parse_int(&args[2]), parse_int(&args[3])) else {
        write_error(out, NOT_INTEGER_ERR);
        return;
    };

    match ks.find_entry(&args[1]) {
        None => write_array_header(out, 0),
        Some(entry) => match &entry.value {
            Value::List(list) => {
                let n = list.len() as i64;
                let mut start = if start < 0 { start + n } else { start };
                let mut stop = if stop < 0 { stop + n } else { stop };
                if start < 0 {
                    start = 0;
                }
                if stop >= n {
                    stop = n - 1;
                }
                if start > stop || start >= n {
                    write_array_header(out, 0);
                    return;
                }

                write_array_header(out, stop - start + 1);
                for i in start..=stop {
                    write_bulk(out, &list[i as usize]);
                }
            }
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::table::test_util::run_str;
    use crate::commands::CommandTable;
    use crate::storage::Keyspace;

    fn setup() -> (CommandTable, Keyspace) {
        (CommandTable::new(), Keyspace::new())
    }

    #[test]
    fn test_rpush_preserves_order() {
        let (table, mut ks) = setup();
        assert_eq!(run_str(&table, &mut ks, &["RPUSH", "k", "x", "y", "z"]), ":3\r\n");
        assert_eq!(
            run_str(&table, &mut ks, &["LRANGE", "k", "0", "-1"]),
            "*3\r\n$1\r\nx\r\n$1\r\ny\r\n$1\r\nz\r\n"
        );
    }

    #[test]
    fn test_lpush_prepends() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["LPUSH", "k", "a", "b"]);
        // Each value is pushed to the head in turn: b ends up first.
        assert_eq!(
            run_str(&table, &mut ks, &["LRANGE", "k", "0", "-1"]),
            "*2\r\n$1\r\nb\r\n$1\r\na\r\n"
        );
    }

    #[test]
    fn test_lpop_and_remaining_range() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["RPUSH", "k", "x", "y", "z"]);
        assert_eq!(run_str(&table, &mut ks, &["LPOP", "k"]), "$1\r\nx\r\n");
        assert_eq!(
            run_str(&table, &mut ks, &["LRANGE", "k", "0", "-1"]),
            "*2\r\n$1\r\ny\r\n$1\r\nz\r\n"
        );
        assert_eq!(run_str(&table, &mut ks, &["RPOP", "k"]), "$1\r\nz\r\n");
    }

    #[test]
    fn test_pop_empties_list_and_deletes_key() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["RPUSH", "k", "only"]);
        assert_eq!(run_str(&table, &mut ks, &["LPOP", "k"]), "$4\r\nonly\r\n");
        assert_eq!(run_str(&table, &mut ks, &["EXISTS", "k"]), ":0\r\n");
        assert_eq!(run_str(&table, &mut ks, &["LPOP", "k"]), "$-1\r\n");
    }

    #[test]
    fn test_llen() {
        let (table, mut ks) = setup();
        assert_eq!(run_str(&table, &mut ks, &["LLEN", "k"]), ":0\r\n");
        run_str(&table, &mut ks, &["RPUSH", "k", "a", "b"]);
        assert_eq!(run_str(&table, &mut ks, &["LLEN", "k"]), ":2\r\n");
    }

    #[test]
    fn test_lrange_negative_and_clamped() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["RPUSH", "k", "a", "b", "c", "d"]);
        assert_eq!(
            run_str(&table, &mut ks, &["LRANGE", "k", "-2", "-1"]),
            "*2\r\n$1\r\nc\r\n$1\r\nd\r\n"
        );
        assert_eq!(
            run_str(&table, &mut ks, &["LRANGE", "k", "-100", "100"]),
            "*4\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n$1\r\nd\r\n"
        );
        assert_eq!(run_str(&table, &mut ks, &["LRANGE", "k", "3", "1"]), "*0\r\n");
        assert_eq!(run_str(&table, &mut ks, &["LRANGE", "none", "0", "-1"]), "*0\r\n");
    }

    #[test]
    fn test_wrong_type_leaves_value_intact() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["SET", "k", "v"]);
        assert!(run_str(&table, &mut ks, &["LPUSH", "k", "x"]).starts_with("-WRONGTYPE"));
        assert_eq!(run_str(&table, &mut ks, &["GET", "k"]), "$1\r\nv\r\n");
    }
}
