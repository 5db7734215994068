//! # EmberKV - An In-Memory Key-Value Server
//!
//! EmberKV is a single-threaded, reactor-driven key-value store speaking
//! a Redis-compatible wire protocol, with append-only persistence.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           EmberKV                               │
//! │                                                                 │
//! │  ┌───────────┐   ┌────────────┐   ┌─────────────┐               │
//! │  │ EventLoop │──▶│ Connection │──▶│   Parser    │               │
//! │  │  (epoll)  │   │ (buffers)  │   │  (frames)   │               │
//! │  └─────┬─────┘   └────────────┘   └──────┬──────┘               │
//! │        │ timer tick                      ▼                      │
//! │        │                         ┌──────────────┐               │
//! │        │                         │ CommandTable │               │
//! │        │                         └──────┬───────┘               │
//! │        ▼                                ▼                       │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                        Keyspace                           │  │
//! │  │   HashTable (incremental rehash) ◀──▶ TtlHeap (deadlines) │  │
//! │  │   Value: Str │ List │ Hash │ Set │ ZSet (SkipList)        │  │
//! │  └──────────────────────────┬────────────────────────────────┘  │
//! │                             ▼                                   │
//! │                     ┌──────────────┐                            │
//! │                     │  AofWriter   │  append log + fork-based   │
//! │                     │  AofLoader   │  compaction, startup replay│
//! │                     └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Highlights
//!
//! ### One Thread, No Locks
//!
//! A single reactor multiplexes every client socket. Handler code runs
//! to completion between two waits, so every command is atomic with
//! respect to every other — the keyspace needs no synchronization. The
//! only other execution is the short-lived compaction child, which
//! shares nothing writable with the parent.
//!
//! ### Incremental Everything
//!
//! The operations that would otherwise stall the loop are spread out:
//! hash-table growth migrates a bounded batch of entries per operation,
//! and expiration reclaims a bounded number of keys per timer tick (plus
//! lazy deletion on access).
//!
//! ### Durability by Replay
//!
//! The append log stores write commands byte-for-byte in wire format;
//! startup replays them through the ordinary dispatcher. Compaction
//! forks a child that rewrites the log as one reconstruction command per
//! live key, then atomically swaps it in.
//!
//! ## Module Overview
//!
//! - [`buffer`]: growable byte region with read/write cursors
//! - [`protocol`]: frame parser and reply serialization
//! - [`storage`]: hash table, TTL heap, skip list, values, keyspace
//! - [`commands`]: dispatcher and the command handlers
//! - [`net`]: listener, per-connection state, epoll reactor
//! - [`persistence`]: append-log writer, compaction, startup replay
//! - [`server`]: the main loop tying it all together

pub mod buffer;
pub mod commands;
pub mod net;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod storage;

pub use buffer::ByteBuffer;
pub use commands::CommandTable;
pub use server::{Config, Server};
pub use storage::Keyspace;

/// The default port (same as Redis).
pub const DEFAULT_PORT: u16 = 6379;

/// Version of EmberKV.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
