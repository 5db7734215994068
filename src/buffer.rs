//! Growable Byte Buffer with Two Cursors
//!
//! This module implements the buffer that backs all network I/O and frame
//! parsing. It is a single contiguous region with a read cursor (start of
//! unconsumed data) and a write cursor (one past the last written byte),
//! which avoids the O(n) cost of erasing consumed bytes from the front.
//!
//! ## Compaction Strategy
//!
//! Making room for a write applies three tiers in order:
//!
//! 1. If the space behind the write cursor already suffices, do nothing.
//! 2. If total capacity minus live data suffices, slide the live data to
//!    offset zero (one `copy_within`).
//! 3. Otherwise compact, then double the capacity until the request fits.
//!
//! There is also a "tier 0" fast path in [`ByteBuffer::consume`]: when the
//! read cursor catches up with the write cursor, both reset to zero. For
//! request-response traffic this is the common case, so the buffer almost
//! never actually compacts.
//!
//! The buffer starts with zero capacity — an idle connection that never
//! receives a byte never allocates.

/// First real allocation size. Matches the per-read window used by
/// connections, so a single small request fits without growing.
const INITIAL_CAPACITY: usize = 4096;

/// A contiguous byte region with separate read and write cursors.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl ByteBuffer {
    /// Creates an empty buffer. No memory is allocated until data arrives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unconsumed region.
    #[inline]
    pub fn readable(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Returns the number of unconsumed bytes.
    #[inline]
    pub fn readable_len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Returns the writable region behind the write cursor.
    ///
    /// Callers pass this slice to a `read(2)`-style call and then report
    /// how much was filled via [`ByteBuffer::advance_write`].
    #[inline]
    pub fn writable_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.write_pos..]
    }

    /// Returns the number of bytes available behind the write cursor.
    #[inline]
    pub fn writable_len(&self) -> usize {
        self.data.len() - self.write_pos
    }

    /// Advances the write cursor after bytes were produced into
    /// [`ByteBuffer::writable_mut`].
    pub fn advance_write(&mut self, n: usize) {
        debug_assert!(self.write_pos + n <= self.data.len());
        self.write_pos += n;
    }

    /// Consumes `n` bytes from the front of the readable region.
    ///
    /// When the read cursor meets the write cursor, both reset to zero so
    /// the whole capacity is writable again without any copying.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.readable_len());
        self.read_pos += n;

        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
    }

    /// Appends bytes at the write cursor, growing the buffer as needed.
    pub fn append(&mut self, bytes: &[u8]) {
        self.ensure_writable(bytes.len());
        self.data[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
    }

    /// Ensures at least `n` writable bytes exist behind the write cursor.
    pub fn ensure_writable(&mut self, n: usize) {
        if self.writable_len() >= n {
            return; // Tier 1: back-space already suffices.
        }

        let readable = self.readable_len();

        // Tier 2: total capacity minus live data suffices — compact.
        if self.data.len() >= readable + n {
            self.data.copy_within(self.read_pos..self.write_pos, 0);
            self.read_pos = 0;
            self.write_pos = readable;
            return;
        }

        // Tier 3: compact, then double until the request fits.
        self.data.copy_within(self.read_pos..self.write_pos, 0);
        self.read_pos = 0;
        self.write_pos = readable;

        let needed = self.write_pos + n;
        let mut new_cap = self.data.len().max(INITIAL_CAPACITY);
        while new_cap < needed {
            new_cap *= 2;
        }
        self.data.resize(new_cap, 0);
    }

    /// Total allocated capacity. Exposed for tests and diagnostics.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
