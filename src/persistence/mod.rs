//! Persistence
//!
//! Durability by replay: the append log is a byte-for-byte record of
//! every write command in wire format. `aof_writer` appends and compacts
//! it; `aof_loader` rebuilds the keyspace from it at startup by feeding
//! it through the ordinary dispatcher.

pub mod aof_loader;
pub mod aof_writer;

pub use aof_loader::load;
pub use aof_writer::{format_command, write_snapshot, AofWriter, FsyncPolicy};
