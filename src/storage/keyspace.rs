//! The Keyspace
//!
//! Facade over the hash table and the expiration heap. All command
//! handlers go through this type, which enforces the two cross-structure
//! invariants:
//!
//! - every entry with a non-negative deadline has exactly one heap entry
//!   with the same key and deadline, and vice versa
//! - an expired entry is never observable: every keyed lookup lazily
//!   deletes it (heap entry included) before proceeding
//!
//! ## Expiration
//!
//! **Lazy**: [`Keyspace::find_entry`], [`Keyspace::get`],
//! [`Keyspace::exists`], and the TTL operations check the deadline at
//! lookup time and delete on the spot.
//!
//! **Active**: the reactor's timer tick calls
//! [`Keyspace::active_expire_cycle`], which pops due deadlines from the
//! heap — bounded per call so a burst of expirations never starves I/O.
//! Keys that are written once with a TTL and never touched again are
//! reclaimed this way.
//!
//! Read paths also advance incremental rehashing by one bounded batch,
//! so a read-heavy workload still finishes a pending table migration.

use crate::storage::hash_table::{Entry, HashTable};
use crate::storage::object::Value;
use crate::storage::ttl_heap::TtlHeap;
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

/// Slots migrated per caller-driven rehash tick.
const REHASH_BATCH: usize = 128;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(_) => 0,
    }
}

/// The shared keyspace: one hash table plus one expiration heap.
#[derive(Debug, Default)]
pub struct Keyspace {
    table: HashTable,
    heap: TtlHeap,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the string projection of `key`'s value, or `None` when
    /// the key is absent, expired, or holds a container.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        self.table.rehash_step(REHASH_BATCH);
        self.expire_if_due(key);
        self.table.find(key).and_then(|e| e.value.string_projection())
    }

    /// Upserts a byte-string value. Any existing expiration is cleared,
    /// in both the entry and the heap.
    pub fn set_string(&mut self, key: Bytes, value: Bytes) {
        self.heap.remove(&key);
        self.table.set(key.clone(), Value::string(value));
        // Overwrites preserve the old deadline; a plain SET must not.
        if let Some(entry) = self.table.find_mut(&key) {
            entry.expire_at = -1;
        }
    }

    /// Upserts a value without touching expiration. Container commands
    /// use this so extending a list does not drop its TTL.
    pub fn set_object(&mut self, key: Bytes, value: Value) {
        self.table.set(key, value);
    }

    /// Deletes a key from both structures. Returns whether it existed.
    pub fn del(&mut self, key: &[u8]) -> bool {
        self.heap.remove(key);
        self.table.del(key)
    }

    /// Presence check with lazy expiration.
    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.table.rehash_step(REHASH_BATCH);
        self.expire_if_due(key);
        self.table.find(key).is_some()
    }

    /// All current keys. No expiration pass — callers that care do their
    /// own lazy checks.
    pub fn keys(&mut self) -> Vec<Bytes> {
        self.table.rehash_step(REHASH_BATCH);
        self.table.keys()
    }

    /// Live key count.
    pub fn dbsize(&self) -> usize {
        self.table.len()
    }

    /// Caller-driven incremental rehash tick (one batch).
    pub fn rehash_step(&mut self) {
        self.table.rehash_step(REHASH_BATCH);
    }

    /// Raw entry accessor with lazy expiration. Container commands use
    /// this to reach the value in place.
    pub fn find_entry(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.expire_if_due(key);
        self.table.find_mut(key)
    }

    /// Entry accessor without expiration or mutation. The compaction
    /// child snapshots through this.
    pub fn peek(&self, key: &[u8]) -> Option<&Entry> {
        self.table.find(key)
    }

    /// Key listing without the rehash tick or expiration — the read-only
    /// companion to [`Keyspace::peek`].
    pub fn peek_keys(&self) -> Vec<Bytes> {
        self.table.keys()
    }

    /// Sets an absolute expiration deadline. Returns `false` when the
    /// key does not exist — including when it existed but was already
    /// expired, in which case it is deleted here.
    pub fn set_expire(&mut self, key: &[u8], deadline_ms: i64) -> bool {
        if self.expire_if_due(key) {
            return false;
        }
        let entry_key = match self.table.find_mut(key) {
            Some(entry) => {
                entry.expire_at = deadline_ms;
                entry.key.clone()
            }
            None => return false,
        };
        self.heap.push(entry_key, deadline_ms);
        true
    }

    /// Clears a key's expiration, if any.
    pub fn remove_expire(&mut self, key: &[u8]) {
        if let Some(entry) = self.table.find_mut(key) {
            entry.expire_at = -1;
            self.heap.remove(key);
        }
    }

    /// Remaining lifetime: −2 when the key is missing (or just expired),
    /// −1 when it has no deadline, otherwise milliseconds left.
    pub fn ttl(&mut self, key: &[u8]) -> i64 {
        if self.expire_if_due(key) {
            return -2;
        }
        match self.table.find(key) {
            None => -2,
            Some(entry) if entry.expire_at < 0 => -1,
            Some(entry) => entry.expire_at - now_ms(),
        }
    }

    /// Pops due deadlines from the heap and deletes the keys, at most
    /// `max_work` per call. Returns how many were reclaimed.
    pub fn active_expire_cycle(&mut self, max_work: usize) -> usize {
        let expired = self.heap.pop_expired(now_ms(), max_work);
        let count = expired.len();
        for key in expired {
            // The heap entry is already gone; drop the table entry.
            self.table.del(&key);
        }
        count
    }

    /// Deletes `key` if its deadline has passed. Returns whether it did.
    fn expire_if_due(&mut self, key: &[u8]) -> bool {
        let due = match self.table.find(key) {
            Some(entry) => entry.expire_at >= 0 && now_ms() >= entry.expire_at,
            None => return false,
        };
        if due {
            self.heap.remove(key);
            self.table.del(key);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn bytes(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_set_get_del() {
        let mut ks = Keyspace::new();
        ks.set_string(bytes("k"), bytes("v"));
        assert_eq!(ks.get(b"k"), Some(bytes("v")));
        assert!(ks.exists(b"k"));
        assert_eq!(ks.dbsize(), 1);

        assert!(ks.del(b"k"));
        assert!(!ks.del(b"k"));
        assert_eq!(ks.get(b"k"), None);
        assert_eq!(ks.dbsize(), 0);
    }

    #[test]
    fn test_get_returns_none_for_containers() {
        let mut ks = Keyspace::new();
        ks.set_object(bytes("l"), Value::empty_list());
        assert_eq!(ks.get(b"l"), None);
        assert!(ks.exists(b"l"));
    }

    #[test]
    fn test_ttl_states() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.ttl(b"missing"), -2);

        ks.set_string(bytes("k"), bytes("v"));
        assert_eq!(ks.ttl(b"k"), -1);

        assert!(ks.set_expire(b"k", now_ms() + 10_000));
        let remaining = ks.ttl(b"k");
        assert!(remaining > 9_000 && remaining <= 10_000, "{remaining}");

        ks.remove_expire(b"k");
        assert_eq!(ks.ttl(b"k"), -1);
    }

    #[test]
    fn test_set_expire_on_missing_key() {
        let mut ks = Keyspace::new();
        assert!(!ks.set_expire(b"ghost", now_ms() + 1000));
    }

    #[test]
    fn test_lazy_expiration_on_access() {
        let mut ks = Keyspace::new();
        ks.set_string(bytes("k"), bytes("v"));
        ks.set_expire(b"k", now_ms() + 30);

        thread::sleep(Duration::from_millis(60));

        assert_eq!(ks.get(b"k"), None);
        assert_eq!(ks.ttl(b"k"), -2);
        assert_eq!(ks.dbsize(), 0);
    }

    #[test]
    fn test_active_expiration_reclaims_untouched_keys() {
        let mut ks = Keyspace::new();
        for i in 0..20 {
            ks.set_string(bytes(&format!("k{i}")), bytes("v"));
            ks.set_expire(format!("k{i}").as_bytes(), now_ms() + 20);
        }
        ks.set_string(bytes("keeper"), bytes("v"));

        thread::sleep(Duration::from_millis(50));

        // Bounded: the first cycle takes at most 8.
        assert_eq!(ks.active_expire_cycle(8), 8);
        assert_eq!(ks.active_expire_cycle(100), 12);
        assert_eq!(ks.dbsize(), 1);
        assert!(ks.exists(b"keeper"));
    }

    #[test]
    fn test_set_string_clears_ttl() {
        let mut ks = Keyspace::new();
        ks.set_string(bytes("k"), bytes("old"));
        ks.set_expire(b"k", now_ms() + 20);

        ks.set_string(bytes("k"), bytes("new"));
        assert_eq!(ks.ttl(b"k"), -1);

        thread::sleep(Duration::from_millis(50));
        // The overwrite dropped the deadline, so nothing expires.
        assert_eq!(ks.active_expire_cycle(100), 0);
        assert_eq!(ks.get(b"k"), Some(bytes("new")));
    }

    #[test]
    fn test_set_object_preserves_ttl() {
        let mut ks = Keyspace::new();
        ks.set_object(bytes("l"), Value::empty_list());
        ks.set_expire(b"l", now_ms() + 10_000);

        ks.set_object(bytes("l"), Value::empty_list());
        assert!(ks.ttl(b"l") > 0);
    }

    #[test]
    fn test_set_expire_on_expired_key_reports_missing() {
        let mut ks = Keyspace::new();
        ks.set_string(bytes("k"), bytes("v"));
        ks.set_expire(b"k", now_ms() + 20);
        thread::sleep(Duration::from_millis(50));

        // The entry is already past its deadline; setting a new TTL must
        // delete it and report the key as absent.
        assert!(!ks.set_expire(b"k", now_ms() + 10_000));
        assert_eq!(ks.dbsize(), 0);
    }

    #[test]
    fn test_keys_lists_everything() {
        let mut ks = Keyspace::new();
        for i in 0..30 {
            ks.set_string(bytes(&format!("k{i}")), bytes("v"));
        }
        let mut keys = ks.keys();
        keys.sort();
        assert_eq!(keys.len(), 30);
        assert_eq!(keys[0], bytes("k0"));
    }
}
