//! Best-move transposition table.
//!
//! A fixed-size array indexed by `hash % size`. Each slot stores the
//! full hash next to the move so an index collision is detected as a
//! mismatch and treated as a miss; colliding stores silently overwrite.
//! This is a move-ordering hint cache, not an exact score store, so a
//! probed move must still be re-validated before use.

use ironpawn_core::Move;

pub const DEFAULT_TABLE_MB: usize = 64;

#[derive(Clone, Copy)]
struct Entry {
    hash: u64,
    best: Move,
}

impl Default for Entry {
    fn default() -> Self {
        Entry {
            hash: 0,
            best: Move::NONE,
        }
    }
}

pub struct TranspositionTable {
    entries: Vec<Entry>,
}

impl TranspositionTable {
    /// Allocate a table of roughly `size_mb` megabytes.
    pub fn new(size_mb: usize) -> Self {
        let bytes = size_mb.max(1) * 1024 * 1024;
        let slots = bytes / std::mem::size_of::<Entry>();
        TranspositionTable {
            entries: vec![Entry::default(); slots],
        }
    }

    #[inline(always)]
    fn index(&self, hash: u64) -> usize {
        (hash % self.entries.len() as u64) as usize
    }

    /// Record the best move for a position, displacing whatever the
    /// slot held before.
    pub fn store(&mut self, hash: u64, best: Move) {
        let index = self.index(hash);
        self.entries[index] = Entry { hash, best };
    }

    /// Look up the stored best move. A slot whose hash does not match
    /// belongs to a different position and reads as a miss.
    pub fn probe(&self, hash: u64) -> Option<Move> {
        let entry = &self.entries[self.index(hash)];
        if entry.hash == hash && !entry.best.is_none() {
            Some(entry.best)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.fill(Entry::default());
    }

    /// Number of slots, for tests and diagnostics.
    pub fn slots(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "transposition_tests.rs"]
mod transposition_tests;
