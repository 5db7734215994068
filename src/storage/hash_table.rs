//! Incrementally-Rehashed Hash Table
//!
//! The primary key index: separate chaining over a power-of-two slot
//! array, with a 64-bit FNV-1a hash cached in every entry.
//!
//! ## Incremental Rehashing
//!
//! Doubling a large table in one go would stall the event loop for every
//! connected client, so growth is spread across many operations. When an
//! insert pushes the load factor past [`MAX_LOAD_FACTOR`], the current
//! table is demoted to *secondary*, a fresh *primary* is allocated at
//! twice the capacity, and a cursor records the next secondary slot to
//! migrate. Each subsequent mutating call (and every explicit
//! [`HashTable::rehash_step`]) migrates a bounded batch of slots, reusing
//! the cached hash so keys are never hashed twice.
//!
//! While both tables are live:
//! - writes go only to primary (after evicting any secondary occurrence)
//! - lookups check primary, then secondary
//! - deletes try primary, then secondary
//!
//! Rehashing finishes when the secondary drains; its slot array is freed
//! and the cursor resets.

use crate::storage::object::Value;
use bytes::Bytes;

/// Rehash trigger threshold: live entries per slot.
const MAX_LOAD_FACTOR: f64 = 2.0;

/// Slots migrated per incremental step.
const REHASH_BATCH: usize = 128;

/// First allocation; doubles from here.
const INITIAL_CAPACITY: usize = 4;

const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// One keyspace entry: the key, its value, the cached hash, the absolute
/// expiration deadline in milliseconds (−1 = none), and the chain link.
#[derive(Debug)]
pub struct Entry {
    pub key: Bytes,
    pub value: Value,
    pub hash: u64,
    pub expire_at: i64,
    next: Option<Box<Entry>>,
}

/// One of the two sub-tables: chain heads plus a live count.
#[derive(Debug, Default)]
struct SubTable {
    slots: Vec<Option<Box<Entry>>>,
    mask: u64,
    len: usize,
}

impl SubTable {
    fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            mask: capacity as u64 - 1,
            len: 0,
        }
    }

    fn slot_of(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }
}

/// Separate-chaining hash table with two sub-tables and a migration
/// cursor. See the module docs for the rehashing protocol.
#[derive(Debug, Default)]
pub struct HashTable {
    primary: SubTable,
    secondary: SubTable,
    rehashing: bool,
    migrate_cursor: usize,
}

impl HashTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 64-bit FNV-1a over the key bytes.
    fn hash_key(key: &[u8]) -> u64 {
        let mut h = FNV_OFFSET_BASIS;
        for &b in key {
            h ^= u64::from(b);
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    /// Total live entries across both sub-tables.
    pub fn len(&self) -> usize {
        self.primary.len + self.secondary.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehashing
    }

    /// Looks up an entry without disturbing the table.
    pub fn find(&self, key: &[u8]) -> Option<&Entry> {
        let hash = Self::hash_key(key);
        Self::table_find(&self.primary, key, hash).or_else(|| {
            if self.rehashing {
                Self::table_find(&self.secondary, key, hash)
            } else {
                None
            }
        })
    }

    /// Looks up an entry for mutation.
    pub fn find_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let hash = Self::hash_key(key);
        if Self::table_find(&self.primary, key, hash).is_some() {
            return Self::table_find_mut(&mut self.primary, key, hash);
        }
        if self.rehashing {
            return Self::table_find_mut(&mut self.secondary, key, hash);
        }
        None
    }

    /// Inserts or overwrites. Overwriting preserves the entry's
    /// expiration deadline; the caller resets it when the semantics call
    /// for that (plain `SET` does, container upserts don't).
    pub fn set(&mut self, key: Bytes, value: Value) {
        if self.rehashing {
            self.rehash_step(REHASH_BATCH);
        }

        let hash = Self::hash_key(&key);

        // Any stale copy in the draining table must go first, or the key
        // would briefly exist twice.
        if self.rehashing {
            let slot = self.secondary.slot_of(hash);
            if chain_remove(&mut self.secondary.slots[slot], &key, hash).is_some() {
                self.secondary.len -= 1;
            }
        }

        if self.primary.slots.is_empty() {
            self.primary = SubTable::with_capacity(INITIAL_CAPACITY);
        }

        if let Some(existing) = Self::table_find_mut(&mut self.primary, &key, hash) {
            existing.value = value;
            return;
        }

        let slot = self.primary.slot_of(hash);
        let entry = Box::new(Entry {
            key,
            value,
            hash,
            expire_at: -1,
            next: self.primary.slots[slot].take(),
        });
        self.primary.slots[slot] = Some(entry);
        self.primary.len += 1;

        let load = self.primary.len as f64 / self.primary.slots.len() as f64;
        if !self.rehashing && load > MAX_LOAD_FACTOR {
            self.trigger_rehash();
        }
    }

    /// Deletes a key. Returns whether it existed.
    pub fn del(&mut self, key: &[u8]) -> bool {
        if self.rehashing {
            self.rehash_step(REHASH_BATCH);
        }

        let hash = Self::hash_key(key);

        if !self.primary.slots.is_empty() {
            let slot = self.primary.slot_of(hash);
            if chain_remove(&mut self.primary.slots[slot], key, hash).is_some() {
                self.primary.len -= 1;
                return true;
            }
        }
        if self.rehashing {
            let slot = self.secondary.slot_of(hash);
            if chain_remove(&mut self.secondary.slots[slot], key, hash).is_some() {
                self.secondary.len -= 1;
                return true;
            }
        }
        false
    }

    /// Collects every key from both sub-tables. Used by `KEYS *` and by
    /// the compaction snapshot.
    pub fn keys(&self) -> Vec<Bytes> {
        let mut out = Vec::with_capacity(self.len());
        for table in [&self.primary, &self.secondary] {
            for slot in &table.slots {
                let mut cursor = slot.as_deref();
                while let Some(entry) = cursor {
                    out.push(entry.key.clone());
                    cursor = entry.next.as_deref();
                }
            }
        }
        out
    }

    /// Migrates up to `max_slots` secondary slots into the primary.
    pub fn rehash_step(&mut self, max_slots: usize) {
        for _ in 0..max_slots {
            if !self.rehashing {
                return;
            }
            self.migrate_one_slot();
        }
    }

    fn trigger_rehash(&mut self) {
        debug_assert!(!self.rehashing);
        let new_capacity = self.primary.slots.len() * 2;
        self.secondary = std::mem::replace(&mut self.primary, SubTable::with_capacity(new_capacity));
        self.rehashing = true;
        self.migrate_cursor = 0;
    }

    fn migrate_one_slot(&mut self) {
        while self.migrate_cursor < self.secondary.slots.len()
            && self.secondary.slots[self.migrate_cursor].is_none()
        {
            self.migrate_cursor += 1;
        }
        if self.migrate_cursor >= self.secondary.slots.len() {
            self.finish_rehash();
            return;
        }

        // Move the whole chain, one entry at a time, reusing cached hashes.
        while let Some(mut entry) = self.secondary.slots[self.migrate_cursor].take() {
            self.secondary.slots[self.migrate_cursor] = entry.next.take();

            let dst = self.primary.slot_of(entry.hash);
            entry.next = self.primary.slots[dst].take();
            self.primary.slots[dst] = Some(entry);
            self.primary.len += 1;
            self.secondary.len -= 1;
        }
        self.migrate_cursor += 1;

        if self.secondary.len == 0 {
            self.finish_rehash();
        }
    }

    fn finish_rehash(&mut self) {
        self.secondary = SubTable::default();
        self.rehashing = false;
        self.migrate_cursor = 0;
    }

    fn table_find<'a>(table: &'a SubTable, key: &[u8], hash: u64) -> Option<&'a Entry> {
        if table.slots.is_empty() {
            return None;
        }
        let mut cursor = table.slots[table.slot_of(hash)].as_deref();
        while let Some(entry) = cursor {
            if entry.hash == hash && &entry.key[..] == key {
                return Some(entry);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    fn table_find_mut<'a>(table: &'a mut SubTable, key: &[u8], hash: u64) -> Option<&'a mut Entry> {
        if table.slots.is_empty() {
            return None;
        }
        let slot = table.slot_of(hash);
        chain_find_mut(table.slots[slot].as_deref_mut(), key, hash)
    }
}

/// Walks a chain for mutation. Recursive: chains stay short (the load
/// factor caps the expected length around two), and the borrow checker
/// rejects the iterative conditional-return form.
fn chain_find_mut<'a>(link: Option<&'a mut Entry>, key: &[u8], hash: u64) -> Option<&'a mut Entry> {
    match link {
        None => None,
        Some(entry) => {
            if entry.hash == hash && &entry.key[..] == key {
                Some(entry)
            } else {
                chain_find_mut(entry.next.as_deref_mut(), key, hash)
            }
        }
    }
}

/// Unlinks and returns the matching entry from a chain.
fn chain_remove(link: &mut Option<Box<Entry>>, key: &[u8], hash: u64) -> Option<Box<Entry>> {
    let matches = match link {
        Some(entry) => entry.hash == hash && &entry.key[..] == key,
        None => return None,
    };
    if matches {
        let mut removed = link.take()?;
        *link = removed.next.take();
        Some(removed)
    } else if let Some(entry) = link {
        chain_remove(&mut entry.next, key, hash)
    } else {
        None
    }
}
