//! Sorted-Set Commands: ZADD, ZSCORE, ZRANK, ZRANGE, ZCARD, ZREM
//!
//! A sorted set pairs a member→score map with a skip-list index ordered
//! by (score, member). Scores are IEEE-754 doubles; NaN is rejected at
//! parse time so the index ordering stays total.

use crate::buffer::ByteBuffer;
use crate::commands::{entry_for_update, parse_int, parse_score, CommandEntry, CommandTable};
use crate::commands::{NOT_FLOAT_ERR, NOT_INTEGER_ERR, WRONGTYPE_ERR};
use crate::protocol::types::{write_array_header, write_bulk, write_error, write_integer, write_null};
use crate::storage::object::{format_score, Value, ValueKind};
use crate::storage::Keyspace;
use bytes::Bytes;

pub fn register_all(table: &mut CommandTable) {
    table.register(CommandEntry {
        name: "ZADD",
        arity: -4,
        is_write: true,
        handler: cmd_zadd,
    });
    table.register(CommandEntry {
        name: "ZSCORE",
        arity: 3,
        is_write: false,
        handler: cmd_zscore,
    });
    table.register(CommandEntry {
        name: "ZRANK",
        arity: 3,
        is_write: false,
        handler: cmd_zrank,
    });
    table.register(CommandEntry {
        name: "ZRANGE",
        arity: -4,
        is_write: false,
        handler: cmd_zrange,
    });
    table.register(CommandEntry {
        name: "ZCARD",
        arity: 2,
        is_write: false,
        handler: cmd_zcard,
    });
    table.register(CommandEntry {
        name: "ZREM",
        arity: -3,
        is_write: true,
        handler: cmd_zrem,
    });
}

/// ZADD key score member [score member ...] — count of members newly
/// added (score updates of existing members don't count).
fn cmd_zadd(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    if (args.len() - 2) % 2 != 0 {
        write_error(out, "ERR wrong number of arguments for 'zadd' command");
        return;
    }

    // Validate every score up front so a bad pair mutates nothing.
    let mut pairs = Vec::with_capacity((args.len() - 2) / 2);
    for chunk in args[2..].chunks(2) {
        let Some(score) = parse_score(&chunk[0]) else {
            write_error(out, NOT_FLOAT_ERR);
            return;
        };
        pairs.push((score, chunk[1].clone()));
    }

    let Some(entry) = entry_for_update(ks, out, &args[1], ValueKind::ZSet) else {
        return;
    };
    if let Value::ZSet(zset) = &mut entry.value {
        let mut added = 0;
        for (score, member) in pairs {
            if zset.upsert(member, score) {
                added += 1;
            }
        }
        write_integer(out, added);
    }
}

/// ZSCORE key member — the member's score as a bulk string.
fn cmd_zscore(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match &entry.value {
            Value::ZSet(zset) => match zset.score(&args[2]) {
                Some(score) => write_bulk(out, format_score(score).as_bytes()),
                None => write_null(out),
            },
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// ZRANK key member — 0-based position in (score, member) order.
fn cmd_zrank(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match &entry.value {
            Value::ZSet(zset) => match zset.rank(&args[2]) {
                Some(rank) => write_integer(out, rank as i64),
                None => write_null(out),
            },
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// ZRANGE key start stop [WITHSCORES] — members in order, optionally
/// interleaved with their scores.
fn cmd_zrange(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let with_scores = match args.len() {
        4 => false,
        5 if args[4].eq_ignore_ascii_case(b"WITHSCORES") => true,
        _ => {
            write_error(out, "ERR syntax error");
            return;
        }
    };

    let (Some(start), Some(stop)) = (parse_int(&args[2]), parse_int(&args[3])) else {
        write_error(out, NOT_INTEGER_ERR);
        return;
    };

    match ks.find_entry(&args[1]) {
        None => write_array_header(out, 0),
        Some(entry) => match &entry.value {
            Value::ZSet(zset) => {
                let elements = zset.range_by_rank(start, stop);
                if with_scores {
                    write_array_header(out, (elements.len() * 2) as i64);
                    for (member, score) in elements {
                        write_bulk(out, &member);
                        write_bulk(out, format_score(score).as_bytes());
                    }
                } else {
                    write_array_header(out, elements.len() as i64);
                    for (member, _) in elements {
                        write_bulk(out, &member);
                    }
                }
            }
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// ZCARD key — member count, `:0` for a missing key.
fn cmd_zcard(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    match ks.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::ZSet(zset) => write_integer(out, zset.len() as i64),
            _ => write_error(out, WRONGTYPE_ERR),
        },
    }
}

/// ZREM key member [member ...] — count removed; deletes an emptied set.
fn cmd_zrem(ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) {
    let removed;
    let now_empty;
    match ks.find_entry(&args[1]) {
        None => {
            write_integer(out, 0);
            return;
        }
        Some(entry) => match &mut entry.value {
            Value::ZSet(zset) => {
                removed = args[2..]
                    .iter()
                    .filter(|member| zset.remove(member))
                    .count();
                now_empty = zset.is_empty();
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

#[cfg(test)]
mod tests {
    use crate::commands::table::test_util::run_str;
    use crate::commands::CommandTable;
    use crate::storage::Keyspace;

    fn setup() -> (CommandTable, Keyspace) {
        (CommandTable::new(), Keyspace::new())
    }

    #[test]
    fn test_zadd_and_update() {
        let (table, mut ks) = setup();
        assert_eq!(
            run_str(&table, &mut ks, &["ZADD", "z", "1", "a", "2", "b", "3", "c"]),
            ":3\r\n"
        );
        // Updating an existing member is not an add.
        assert_eq!(run_str(&table, &mut ks, &["ZADD", "z", "5", "a"]), ":0\r\n");
        assert_eq!(
            run_str(&table, &mut ks, &["ZRANGE", "z", "0", "-1", "WITHSCORES"]),
            "*6\r\n$1\r\nb\r\n$1\r\n2\r\n$1\r\nc\r\n$1\r\n3\r\n$1\r\na\r\n$1\r\n5\r\n"
        );
    }

    #[test]
    fn test_zadd_rejects_bad_score_without_mutating() {
        let (table, mut ks) = setup();
        assert_eq!(
            run_str(&table, &mut ks, &["ZADD", "z", "1", "a", "pear", "b"]),
            "-ERR value is not a valid float\r\n"
        );
        assert_eq!(run_str(&table, &mut ks, &["EXISTS", "z"]), ":0\r\n");
        assert_eq!(
            run_str(&table, &mut ks, &["ZADD", "z", "nan", "a"]),
            "-ERR value is not a valid float\r\n"
        );
    }

    #[test]
    fn test_zadd_odd_pairs_rejected() {
        let (table, mut ks) = setup();
        assert_eq!(
            run_str(&table, &mut ks, &["ZADD", "z", "1", "a", "2"]),
            "-ERR wrong number of arguments for 'zadd' command\r\n"
        );
    }

    #[test]
    fn test_zscore_renders_fractions() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["ZADD", "z", "2.5", "m"]);
        assert_eq!(run_str(&table, &mut ks, &["ZSCORE", "z", "m"]), "$3\r\n2.5\r\n");
        assert_eq!(run_str(&table, &mut ks, &["ZSCORE", "z", "nope"]), "$-1\r\n");
        assert_eq!(run_str(&table, &mut ks, &["ZSCORE", "none", "m"]), "$-1\r\n");
    }

    #[test]
    fn test_zrank_follows_order() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["ZADD", "z", "10", "x", "1", "y", "5", "w"]);
        assert_eq!(run_str(&table, &mut ks, &["ZRANK", "z", "y"]), ":0\r\n");
        assert_eq!(run_str(&table, &mut ks, &["ZRANK", "z", "w"]), ":1\r\n");
        assert_eq!(run_str(&table, &mut ks, &["ZRANK", "z", "x"]), ":2\r\n");
        assert_eq!(run_str(&table, &mut ks, &["ZRANK", "z", "ghost"]), "$-1\r\n");
    }

    #[test]
    fn test_zrange_without_scores_and_negative_indices() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["ZADD", "z", "1", "a", "2", "b", "3", "c"]);
        assert_eq!(
            run_str(&table, &mut ks, &["ZRANGE", "z", "-2", "-1"]),
            "*2\r\n$1\r\nb\r\n$1\r\nc\r\n"
        );
    }

    #[test]
    fn test_zrange_flag_validation() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["ZADD", "z", "1", "a"]);
        assert_eq!(
            run_str(&table, &mut ks, &["ZRANGE", "z", "0", "-1", "WITHGUESSES"]),
            "-ERR syntax error\r\n"
        );
        assert_eq!(
            run_str(&table, &mut ks, &["ZRANGE", "z", "0", "-1", "withscores"]),
            "*2\r\n$1\r\na\r\n$1\r\n1\r\n"
        );
    }

    #[test]
    fn test_zrem_deletes_empty_zset() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["ZADD", "z", "1", "a", "2", "b"]);
        assert_eq!(run_str(&table, &mut ks, &["ZREM", "z", "a", "ghost"]), ":1\r\n");
        assert_eq!(run_str(&table, &mut ks, &["ZCARD", "z"]), ":1\r\n");
        assert_eq!(run_str(&table, &mut ks, &["ZREM", "z", "b"]), ":1\r\n");
        assert_eq!(run_str(&table, &mut ks, &["EXISTS", "z"]), ":0\r\n");
    }

    #[test]
    fn test_ties_break_by_member() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["ZADD", "z", "1", "bb", "1", "aa", "1", "cc"]);
        assert_eq!(
            run_str(&table, &mut ks, &["ZRANGE", "z", "0", "-1"]),
            "*3\r\n$2\r\naa\r\n$2\r\nbb\r\n$2\r\ncc\r\n"
        );
    }

    #[test]
    fn test_wrong_type() {
        let (table, mut ks) = setup();
        run_str(&table, &mut ks, &["SET", "s", "v"]);
        assert!(run_str(&table, &mut ks, &["ZADD", "s", "1", "a"]).starts_with("-WRONGTYPE"));
        assert!(run_str(&table, &mut ks, &["ZCARD", "s"]).starts_with("-WRONGTYPE"));
    }
}
