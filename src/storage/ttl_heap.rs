//! Expiration Min-Heap
//!
//! Tracks every key that carries an expiration deadline, ordered so the
//! earliest deadline sits at the root. A side map from key to array
//! position turns `remove` and `update` — which a plain binary heap only
//! supports by scanning — into O(log n) operations, which matters because
//! every `SET` and `DEL` on a TTL-carrying key touches the heap.
//!
//! The active expiration cycle calls [`TtlHeap::pop_expired`] with a work
//! bound so a burst of simultaneous deadlines cannot starve the event
//! loop.

use bytes::Bytes;
use std::collections::HashMap;

/// A (key, deadline) pair. Deadlines are milliseconds since the epoch.
#[derive(Debug, Clone)]
pub struct HeapEntry {
    pub key: Bytes,
    pub expire_at: i64,
}

/// Array-backed binary min-heap keyed by deadline, with an O(1)
/// key-to-position index.
#[derive(Debug, Default)]
pub struct TtlHeap {
    heap: Vec<HeapEntry>,
    index: HashMap<Bytes, usize>,
}

impl TtlHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Adds a key with a deadline. A key already present is updated
    /// instead — the heap never holds duplicates.
    pub fn push(&mut self, key: Bytes, expire_at: i64) {
        if self.index.contains_key(&key) {
            self.update(&key, expire_at);
            return;
        }

        // The clone shares the allocation; heap and index deliberately
        // hold the same underlying key storage.
        self.heap.push(HeapEntry {
            key: key.clone(),
            expire_at,
        });
        let idx = self.heap.len() - 1;
        self.index.insert(key, idx);
        self.sift_up(idx);

        debug_assert_eq!(self.heap.len(), self.index.len());
    }

    /// Removes a key. No-op when absent.
    pub fn remove(&mut self, key: &[u8]) {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => return,
        };

        let last = self.heap.len() - 1;
        if idx != last {
            self.swap_entries(idx, last);
        }
        let removed = match self.heap.pop() {
            Some(entry) => entry,
            None => return,
        };
        self.index.remove(&removed.key);

        if idx < self.heap.len() {
            self.sift_down(idx);
            self.sift_up(idx);
        }

        debug_assert_eq!(self.heap.len(), self.index.len());
    }

    /// Changes a key's deadline in place; pushes when the key is absent.
    pub fn update(&mut self, key: &[u8], expire_at: i64) {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.push(Bytes::copy_from_slice(key), expire_at);
                return;
            }
        };

        self.heap[idx].expire_at = expire_at;
        // The new deadline may be earlier or later; only one direction
        // actually moves the entry.
        self.sift_up(idx);
        self.sift_down(idx);

        debug_assert_eq!(self.heap.len(), self.index.len());
    }

    /// Pops at most `max_work` keys whose deadline is at or before `now`,
    /// in deadline order.
    pub fn pop_expired(&mut self, now: i64, max_work: usize) -> Vec<Bytes> {
        let mut expired = Vec::new();

        while !self.heap.is_empty() && expired.len() < max_work {
            if self.heap[0].expire_at > now {
                break;
            }

            let last = self.heap.len() - 1;
            if last > 0 {
                self.swap_entries(0, last);
            }
            let entry = match self.heap.pop() {
                Some(entry) => entry,
                None => break,
            };
            self.index.remove(&entry.key);

            if !self.heap.is_empty() {
                self.sift_down(0);
            }

            expired.push(entry.key);
        }

        debug_assert_eq!(self.heap.len(), self.index.len());
        expired
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].expire_at >= self.heap[parent].expire_at {
                break;
            }
            self.swap_entries(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;

            if left < self.heap.len() && self.heap[left].expire_at < self.heap[smallest].expire_at {
                smallest = left;
            }
            if right < self.heap.len() && self.heap[right].expire_at < self.heap[smallest].expire_at
            {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap_entries(idx, smallest);
            idx = smallest;
        }
    }

    /// Swaps two entries and fixes the position index for both.
    fn swap_entries(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].key.clone(), a);
        self.index.insert(self.heap[b].key.clone(), b);
    }

    #[cfg(test)]
    fn assert_heap_property(&self) {
        for idx in 1..self.heap.len() {
            let parent = (idx - 1) / 2;
            assert!(
                self.heap[parent].expire_at <= self.heap[idx].expire_at,
                "heap property violated at {idx}"
            );
        }
        assert_eq!(self.heap.len(), self.index.len());
        for (idx, entry) in self.heap.iter().enumerate() {
            assert_eq!(self.index.get(&entry.key), Some(&idx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_push_and_pop_in_deadline_order() {
        let mut heap = TtlHeap::new();
        heap.push(key("c"), 300);
        heap.push(key("a"), 100);
        heap.push(key("b"), 200);
        heap.assert_heap_property();

        let expired = heap.pop_expired(1000, 10);
        assert_eq!(expired, vec![key("a"), key("b"), key("c")]);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_pop_expired_respects_now() {
        let mut heap = TtlHeap::new();
        heap.push(key("early"), 100);
        heap.push(key("late"), 900);

        let expired = heap.pop_expired(500, 10);
        assert_eq!(expired, vec![key("early")]);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_pop_expired_bounded_work() {
        let mut heap = TtlHeap::new();
        for i in 0..50 {
            heap.push(key(&format!("k{i}")), i);
        }
        let first = heap.pop_expired(1000, 20);
        assert_eq!(first.len(), 20);
        assert_eq!(heap.len(), 30);
        heap.assert_heap_property();

        let second = heap.pop_expired(1000, 100);
        assert_eq!(second.len(), 30);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_push_existing_key_updates_deadline() {
        let mut heap = TtlHeap::new();
        heap.push(key("k"), 500);
        heap.push(key("k"), 100);
        assert_eq!(heap.len(), 1);

        let expired = heap.pop_expired(200, 10);
        assert_eq!(expired, vec![key("k")]);
    }

    #[test]
    fn test_remove_middle_entry() {
        let mut heap = TtlHeap::new();
        for i in 0..20 {
            heap.push(key(&format!("k{i}")), 20 - i);
        }
        heap.remove(b"k10");
        heap.remove(b"nonexistent");
        assert_eq!(heap.len(), 19);
        heap.assert_heap_property();

        let expired = heap.pop_expired(100, 100);
        assert_eq!(expired.len(), 19);
        assert!(!expired.contains(&key("k10")));
    }

    #[test]
    fn test_update_moves_both_directions() {
        let mut heap = TtlHeap::new();
        heap.push(key("a"), 100);
        heap.push(key("b"), 200);
        heap.push(key("c"), 300);

        heap.update(b"a", 999); // later — sifts down
        heap.update(b"c", 1); // earlier — sifts up
        heap.assert_heap_property();

        let expired = heap.pop_expired(1000, 10);
        assert_eq!(expired, vec![key("c"), key("b"), key("a")]);
    }

    #[test]
    fn test_randomized_mutations_keep_invariants() {
        // Deterministic pseudo-random walk over push/remove/update/pop.
        let mut heap = TtlHeap::new();
        let mut state: u64 = 0x9e3779b97f4a7c15;
        for round in 0..2000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let k = key(&format!("k{}", state % 64));
            match state >> 60 {
                0..=7 => heap.push(k, (state % 10_000) as i64),
                8..=10 => heap.remove(&k),
                11..=13 => heap.update(&k, (state % 10_000) as i64),
                _ => {
                    heap.pop_expired((state % 10_000) as i64, 5);
                }
            }
            if round % 97 == 0 {
                heap.assert_heap_property();
            }
        }
        heap.assert_heap_property();
    }
}
