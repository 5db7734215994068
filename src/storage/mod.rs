//! Keyspace Engine
//!
//! The in-memory heart of the server, built from four data structures
//! plus a facade:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                       Keyspace                         │
//! │                                                        │
//! │  ┌───────────────────┐       ┌─────────────────────┐   │
//! │  │    HashTable      │       │      TtlHeap        │   │
//! │  │  key → Entry      │◀─────▶│  (key, deadline)    │   │
//! │  │  incremental      │       │  min-heap + pos map │   │
//! │  │  rehashing        │       └─────────────────────┘   │
//! │  └─────────┬─────────┘                                 │
//! │            │ Entry.value                               │
//! │            ▼                                           │
//! │  ┌───────────────────┐       ┌─────────────────────┐   │
//! │  │      Value        │  ZSet │     SkipList        │   │
//! │  │  Str/List/Hash/   │──────▶│  (score, member)    │   │
//! │  │  Set/ZSet         │       │  ordered index      │   │
//! │  └───────────────────┘       └─────────────────────┘   │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in here knows about sockets, frames, or command names.

pub mod hash_table;
pub mod keyspace;
pub mod object;
pub mod skiplist;
pub mod ttl_heap;

pub use hash_table::{Entry, HashTable};
pub use keyspace::{now_ms, Keyspace};
pub use object::{format_score, StrVal, Value, ValueKind, ZSet};
pub use skiplist::SkipList;
pub use ttl_heap::TtlHeap;
