//! Stored Value Representation
//!
//! Every key maps to exactly one [`Value`] — a closed sum of the five
//! supported shapes. The enum tag is the externally visible type; string
//! values additionally carry an encoding: a payload that parses as a
//! complete signed 64-bit decimal integer is stored as the integer and
//! projected back to its decimal rendering on read.
//!
//! Container values hold owned collections and are deliberately not
//! `Clone` — values move between the keyspace and callers, never
//! duplicate.

use crate::storage::skiplist::SkipList;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

/// The externally visible type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    List,
    Hash,
    Set,
    ZSet,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::List => "list",
            Self::Hash => "hash",
            Self::Set => "set",
            Self::ZSet => "zset",
        }
    }
}

/// Internal encoding of a string value.
#[derive(Debug)]
pub enum StrVal {
    /// Arbitrary bytes.
    Raw(Bytes),
    /// The payload was a complete signed decimal integer.
    Int(i64),
}

/// A sorted set: the member→score map gives O(1) score lookups, the skip
/// list keeps (score, member) order. The two always agree on membership
/// and per-member score.
#[derive(Debug, Default)]
pub struct ZSet {
    index: SkipList,
    scores: HashMap<Bytes, f64>,
}

impl ZSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.index.len(), self.scores.len());
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Adds a member or updates its score. Returns `true` when the member
    /// is new.
    pub fn upsert(&mut self, member: Bytes, score: f64) -> bool {
        match self.scores.get(&member[..]) {
            Some(&old) => {
                if old != score {
                    self.index.remove(&member, old);
                    self.index.insert(member.clone(), score);
                    self.scores.insert(member, score);
                }
                false
            }
            None => {
                self.index.insert(member.clone(), score);
                self.scores.insert(member, score);
                true
            }
        }
    }

    /// Removes a member. Returns whether it existed.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.index.remove(member, score);
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.index.rank(member, score)
    }

    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(Bytes, f64)> {
        self.index.range_by_rank(start, stop)
    }
}

/// A stored value: one of five variants.
#[derive(Debug)]
pub enum Value {
    Str(StrVal),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    ZSet(ZSet),
}

impl Value {
    /// Builds a string value, probing for the integer encoding: the
    /// payload must parse as a signed 64-bit decimal in its entirety.
    pub fn string(data: Bytes) -> Self {
        if let Some(n) = parse_whole_i64(&data) {
            return Value::Str(StrVal::Int(n));
        }
        Value::Str(StrVal::Raw(data))
    }

    pub fn empty_list() -> Self {
        Value::List(VecDeque::new())
    }

    pub fn empty_hash() -> Self {
        Value::Hash(HashMap::new())
    }

    pub fn empty_set() -> Self {
        Value::Set(HashSet::new())
    }

    pub fn empty_zset() -> Self {
        Value::ZSet(ZSet::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Hash(_) => ValueKind::Hash,
            Value::Set(_) => ValueKind::Set,
            Value::ZSet(_) => ValueKind::ZSet,
        }
    }

    /// The byte-string projection; `None` for container variants.
    /// Integer-encoded strings render back to decimal.
    pub fn string_projection(&self) -> Option<Bytes> {
        match self {
            Value::Str(StrVal::Raw(data)) => Some(data.clone()),
            Value::Str(StrVal::Int(n)) => Some(Bytes::from(n.to_string())),
            _ => None,
        }
    }
}

/// Parses the full byte slice as a signed decimal i64, or nothing.
fn parse_whole_i64(data: &[u8]) -> Option<i64> {
    if data.is_empty() {
        return None;
    }
    std::str::from_utf8(data).ok()?.parse().ok()
}

/// Renders a score the way it appears on the wire and in the append log.
/// Rust's `Display` for `f64` emits the shortest string that reparses to
/// the identical double, so scores survive a dump-and-replay cycle
/// bit-for-bit.
pub fn format_score(score: f64) -> String {
    format!("{score}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_string_integer_encoding() {
        let v = Value::string(bytes("12345"));
        assert!(matches!(v, Value::Str(StrVal::Int(12345))));
        assert_eq!(v.string_projection(), Some(bytes("12345")));

        let negative = Value::string(bytes("-42"));
        assert!(matches!(negative, Value::Str(StrVal::Int(-42))));
    }

    #[test]
    fn test_string_raw_encoding() {
        for raw in ["hello", "12.5", "123abc", "", " 1", "9223372036854775808"] {
            let v = Value::string(bytes(raw));
            assert!(
                matches!(v, Value::Str(StrVal::Raw(_))),
                "{raw:?} should not integer-encode"
            );
            assert_eq!(v.string_projection(), Some(bytes(raw)));
        }
    }

    #[test]
    fn test_i64_boundaries() {
        let min = Value::string(bytes("-9223372036854775808"));
        assert!(matches!(min, Value::Str(StrVal::Int(i64::MIN))));
        let max = Value::string(bytes("9223372036854775807"));
        assert!(matches!(max, Value::Str(StrVal::Int(i64::MAX))));
    }

    #[test]
    fn test_projection_only_for_strings() {
        assert!(Value::empty_list().string_projection().is_none());
        assert!(Value::empty_hash().string_projection().is_none());
        assert!(Value::empty_set().string_projection().is_none());
        assert!(Value::empty_zset().string_projection().is_none());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::string(bytes("x")).kind().as_str(), "string");
        assert_eq!(Value::empty_zset().kind().as_str(), "zset");
    }

    #[test]
    fn test_zset_upsert_and_order() {
        let mut z = ZSet::new();
        assert!(z.upsert(bytes("a"), 1.0));
        assert!(z.upsert(bytes("b"), 2.0));
        assert!(z.upsert(bytes("c"), 3.0));
        // Updating an existing member is not an add.
        assert!(!z.upsert(bytes("a"), 5.0));

        assert_eq!(z.len(), 3);
        assert_eq!(z.score(b"a"), Some(5.0));
        let order: Vec<_> = z.range_by_rank(0, -1).into_iter().map(|(m, _)| m).collect();
        assert_eq!(order, vec![bytes("b"), bytes("c"), bytes("a")]);
    }

    #[test]
    fn test_zset_upsert_same_score_is_noop() {
        let mut z = ZSet::new();
        z.upsert(bytes("m"), 1.5);
        assert!(!z.upsert(bytes("m"), 1.5));
        assert_eq!(z.len(), 1);
        assert_eq!(z.rank(b"m"), Some(0));
    }

    #[test]
    fn test_zset_remove_keeps_halves_in_sync() {
        let mut z = ZSet::new();
        for i in 0..10 {
            z.upsert(bytes(&format!("m{i}")), i as f64);
        }
        assert!(z.remove(b"m5"));
        assert!(!z.remove(b"m5"));
        assert_eq!(z.len(), 9);
        assert_eq!(z.score(b"m5"), None);
        assert_eq!(z.range_by_rank(0, -1).len(), 9);
    }

    #[test]
    fn test_format_score_round_trips() {
        for score in [0.0, 2.0, -3.5, 0.1, 1e300, 1.0 / 3.0, f64::MIN_POSITIVE] {
            let rendered = format_score(score);
            let reparsed: f64 = rendered.parse().unwrap();
            assert_eq!(reparsed.to_bits(), score.to_bits(), "{rendered}");
        }
    }

    #[test]
    fn test_format_score_integral_renders_bare() {
        assert_eq!(format_score(2.0), "2");
        assert_eq!(format_score(5.0), "5");
        assert_eq!(format_score(-7.0), "-7");
    }
}
