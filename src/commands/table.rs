//! Command Dispatch Table
//!
//! Maps uppercase command names to handler entries and validates arity
//! before invoking. Arity counts the command name itself: a positive
//! value demands that exact argument count, a negative value demands at
//! least its absolute value (`-3` means "three or more").
//!
//! Unknown names and wrong arity produce protocol error replies — they
//! are never fatal to the connection. The dispatcher reports back whether
//! it ran a write-flagged command so the server can feed the append log;
//! the replay loader ignores that verdict.

use crate::buffer::ByteBuffer;
use crate::protocol::types::write_error;
use crate::storage::Keyspace;
use bytes::Bytes;
use std::collections::HashMap;

/// A command handler: mutates the keyspace, writes one reply.
pub type Handler = fn(&mut Keyspace, &mut ByteBuffer, &[Bytes]);

/// One registered command.
pub struct CommandEntry {
    pub name: &'static str,
    /// Positive = exact argument count; negative = minimum.
    pub arity: i32,
    /// Write-flagged commands are fed to the append log after execution.
    pub is_write: bool,
    pub handler: Handler,
}

/// Case-insensitive name→entry table.
pub struct CommandTable {
    table: HashMap<String, CommandEntry>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    /// Builds the table with every supported command registered.
    pub fn new() -> Self {
        let mut table = Self {
            table: HashMap::new(),
        };
        crate::commands::strings::register_all(&mut table);
        crate::commands::keys::register_all(&mut table);
        crate::commands::lists::register_all(&mut table);
        crate::commands::hashes::register_all(&mut table);
        crate::commands::sets::register_all(&mut table);
        crate::commands::zsets::register_all(&mut table);
        table
    }

    /// Registers one command, keyed by its uppercased name.
    pub fn register(&mut self, entry: CommandEntry) {
        self.table.insert(entry.name.to_ascii_uppercase(), entry);
    }

    /// Validates and executes one parsed command, writing the reply into
    /// `out`. Returns `true` when a write-flagged command was accepted —
    /// the caller's cue to append the argument vector to the log.
    pub fn dispatch(&self, ks: &mut Keyspace, out: &mut ByteBuffer, args: &[Bytes]) -> bool {
        let Some(name) = args.first() else {
            return false;
        };
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();

        let Some(entry) = self.table.get(&name) else {
            write_error(out, &format!("ERR unknown command '{name}'"));
            return false;
        };

        let argc = args.len() as i32;
        let arity_ok = if entry.arity > 0 {
            argc == entry.arity
        } else {
            argc >= -entry.arity
        };
        if !arity_ok {
            write_error(
                out,
                &format!("ERR wrong number of arguments for '{name}' command"),
            );
            return false;
        }

        (entry.handler)(ks, out, args);
        entry.is_write
    }
}
