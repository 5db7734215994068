//! Probabilistic Ordered Index
//!
//! The ordered half of every sorted set: a skip list keyed by
//! (score ascending, member ascending). Expected O(log n) insert and
//! remove without any rebalancing — each node is assigned a random level
//! with a geometric distribution (promotion probability 1/4, at most 32
//! levels), and higher levels act as express lanes over the sorted
//! level-0 chain.
//!
//! ## Representation
//!
//! Rust has no owned raw node pointers to chase, so nodes live in an
//! arena (`Vec<Node>`) and link to each other through dense indices, with
//! a free list recycling removed slots. Index 0 is the head sentinel; it
//! holds no element and keeps `MAX_LEVEL` forward links. The level-0
//! chain additionally carries a backward index for reverse traversal.
//!
//! Each list owns its own PRNG, seeded from process entropy at
//! construction — two lists never share level-generation state, and
//! there is no process-wide mutable state anywhere in this module.

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Upper bound on node levels. With p = 1/4, level 32 would need on the
/// order of 4^32 elements.
const MAX_LEVEL: usize = 32;

/// Promotion denominator: each level continues with probability 1/4.
const BRANCHING: u32 = 4;

/// Sentinel "no node" index.
const NIL: usize = usize::MAX;

/// Arena index of the head sentinel.
const HEAD: usize = 0;

#[derive(Debug)]
struct Node {
    member: Bytes,
    score: f64,
    /// Forward link per level; the vector's length is the node's level.
    forward: Vec<usize>,
    /// Level-0 predecessor, `NIL` when the head sentinel precedes.
    backward: usize,
}

/// Skip list ordered by (score, member). See the module docs.
#[derive(Debug)]
pub struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    level: usize,
    len: usize,
    rng: SmallRng,
}

/// Strict (score, member) ordering. Scores are never NaN here — the
/// command layer rejects them before they reach storage.
fn rank_key_cmp(a_score: f64, a_member: &[u8], b_score: f64, b_member: &[u8]) -> Ordering {
    match a_score.partial_cmp(&b_score) {
        Some(Ordering::Equal) | None => a_member.cmp(b_member),
        Some(ord) => ord,
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Deterministic construction for tests.
    #[cfg(test)]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        let head = Node {
            member: Bytes::new(),
            score: 0.0,
            forward: vec![NIL; MAX_LEVEL],
            backward: NIL,
        };
        Self {
            nodes: vec![head],
            free: Vec::new(),
            level: 1,
            len: 0,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a (member, score) element. The caller guarantees no
    /// duplicate (member, score) pair exists — the member→score map in
    /// front of this index enforces that.
    pub fn insert(&mut self, member: Bytes, score: f64) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;

        for lvl in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].forward[lvl];
                if next == NIL {
                    break;
                }
                let node = &self.nodes[next];
                if rank_key_cmp(node.score, &node.member, score, &member) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
            update[lvl] = x;
        }

        let new_level = self.random_level();
        if new_level > self.level {
            for slot in update.iter_mut().take(new_level).skip(self.level) {
                *slot = HEAD;
            }
            self.level = new_level;
        }

        let idx = self.alloc_node(member, score, new_level);
        for lvl in 0..new_level {
            let succ = self.nodes[update[lvl]].forward[lvl];
            self.nodes[idx].forward[lvl] = succ;
            self.nodes[update[lvl]].forward[lvl] = idx;
        }

        self.nodes[idx].backward = if update[0] == HEAD { NIL } else { update[0] };
        let succ0 = self.nodes[idx].forward[0];
        if succ0 != NIL {
            self.nodes[succ0].backward = idx;
        }

        self.len += 1;
    }

    /// Removes the element matching (member, score) exactly. Returns
    /// whether it was found. Empty top levels are shrunk afterwards.
    pub fn remove(&mut self, member: &[u8], score: f64) -> bool {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;

        for lvl in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].forward[lvl];
                if next == NIL {
                    break;
                }
                let node = &self.nodes[next];
                if rank_key_cmp(node.score, &node.member, score, member) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
            update[lvl] = x;
        }

        let target = self.nodes[x].forward[0];
        if target == NIL {
            return false;
        }
        {
            let node = &self.nodes[target];
            if node.score != score || &node.member[..] != member {
                return false;
            }
        }

        for lvl in 0..self.level {
            if self.nodes[update[lvl]].forward[lvl] != target {
                break;
            }
            let succ = self.nodes[target].forward[lvl];
            self.nodes[update[lvl]].forward[lvl] = succ;
        }

        let succ0 = self.nodes[target].forward[0];
        if succ0 != NIL {
            let pred = self.nodes[target].backward;
            self.nodes[succ0].backward = pred;
        }

        self.free_node(target);
        self.len -= 1;

        while self.level > 1 && self.nodes[HEAD].forward[self.level - 1] == NIL {
            self.level -= 1;
        }
        true
    }

    /// Returns elements with rank in `[start, stop]` inclusive, 0-based.
    /// Negative indices count from the tail; out-of-range bounds clamp
    /// silently.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(Bytes, f64)> {
        let n = self.len as i64;
        let mut start = if start < 0 { start + n } else { start };
        let mut stop = if stop < 0 { stop + n } else { stop };
        if start < 0 {
            start = 0;
        }
        if stop >= n {
            stop = n - 1;
        }

        let mut result = Vec::new();
        if start > stop || start >= n {
            return result;
        }

        let mut x = self.nodes[HEAD].forward[0];
        for _ in 0..start {
            if x == NIL {
                return result;
            }
            x = self.nodes[x].forward[0];
        }

        for _ in start..=stop {
            if x == NIL {
                break;
            }
            let node = &self.nodes[x];
            result.push((node.member.clone(), node.score));
            x = node.forward[0];
        }
        result
    }

    /// 0-based rank of the element matching (member, score) exactly, by
    /// walking the level-0 chain. O(n); the observable contract is only
    /// the rank value.
    pub fn rank(&self, member: &[u8], score: f64) -> Option<usize> {
        let mut x = self.nodes[HEAD].forward[0];
        let mut rank = 0;
        while x != NIL {
            let node = &self.nodes[x];
            if node.score == score && &node.member[..] == member {
                return Some(rank);
            }
            x = node.forward[0];
            rank += 1;
        }
        None
    }

    /// Geometric level draw: keep promoting while a 1-in-4 roll hits.
    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.gen_range(0..BRANCHING) == 0 {
            level += 1;
        }
        level
    }

    fn alloc_node(&mut self, member: Bytes, score: f64, level: usize) -> usize {
        let node = Node {
            member,
            score,
            forward: vec![NIL; level],
            backward: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, idx: usize) {
        // Drop the payload now; the slot is recycled by the next insert.
        self.nodes[idx].member = Bytes::new();
        self.nodes[idx].forward.clear();
        self.free.push(idx);
    }

    #[cfg(test)]
    fn assert_sorted(&self) {
        let elements = self.range_by_rank(0, -1);
        assert_eq!(elements.len(), self.len);
        for pair in elements.windows(2) {
            assert_eq!(
                rank_key_cmp(pair[0].1, &pair[0].0, pair[1].1, &pair[1].0),
                Ordering::Less,
                "level-0 chain out of order"
            );
        }
        // Backward links mirror the forward chain.
        let mut x = self.nodes[HEAD].forward[0];
        let mut prev = NIL;
        while x != NIL {
            assert_eq!(self.nodes[x].backward, prev);
            prev = x;
            x = self.nodes[x].forward[0];
        }
    }
}
