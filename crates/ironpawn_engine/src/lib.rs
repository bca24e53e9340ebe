//! The ironpawn searching engine.
//!
//! Alpha-beta search with quiescence, a best-move transposition table,
//! killer/history move ordering and the classical evaluator, packaged
//! behind the core `Engine` trait.

mod eval;
mod search;
mod transposition;

pub use eval::evaluate;
pub use search::{Searcher, INFINITE};
pub use transposition::{TranspositionTable, DEFAULT_TABLE_MB};

use ironpawn_core::{AttackTables, Engine, Position, SearchLimits, SearchResult};

/// The full-strength engine: iterative-deepening alpha-beta over the
/// classical evaluator.
pub struct AlphaBetaEngine {
    searcher: Searcher,
}

impl Default for AlphaBetaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AlphaBetaEngine {
    pub fn new() -> Self {
        Self::with_table_size(DEFAULT_TABLE_MB)
    }

    pub fn with_table_size(size_mb: usize) -> Self {
        AttackTables::init();
        AlphaBetaEngine {
            searcher: Searcher::new(size_mb),
        }
    }
}

impl Engine for AlphaBetaEngine {
    fn search(&mut self, pos: &Position, limits: SearchLimits) -> SearchResult {
        let mut scratch = pos.clone();
        self.searcher.search(&mut scratch, limits)
    }

    fn name(&self) -> &str {
        "ironpawn 0.1"
    }

    fn new_game(&mut self) {
        self.searcher.new_game();
    }

    fn set_option(&mut self, name: &str, value: &str) -> bool {
        if name.eq_ignore_ascii_case("hash") {
            if let Ok(size_mb) = value.parse::<usize>() {
                self.searcher.resize_table(size_mb.clamp(1, 1024));
                return true;
            }
        }
        false
    }
}
