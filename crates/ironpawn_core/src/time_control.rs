//! Search limits and cooperative time control.
//!
//! A search is bounded by depth, by wall clock, or both. The clock is
//! enforced cooperatively: the searcher polls `TimeControl` every few
//! thousand nodes and unwinds once the stop flag is set. The flag is a
//! shared atomic so a host can also stop a search from outside.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum search depth in plies; also sizes the killer tables.
pub const MAX_DEPTH: usize = 64;

/// What the search is allowed to spend.
#[derive(Debug, Clone)]
pub struct SearchLimits {
    /// Maximum depth in plies.
    pub depth: u8,
    /// Wall-clock budget for this move (None = unbounded).
    pub move_time: Option<Duration>,
    /// Shared stop flag / clock.
    pub time_control: TimeControl,
}

impl SearchLimits {
    /// Depth-only limits, no clock.
    pub fn depth(depth: u8) -> Self {
        Self {
            depth,
            move_time: None,
            time_control: TimeControl::new(None),
        }
    }

    /// Time-only limits; depth runs to the ply cap.
    pub fn move_time(move_time: Duration) -> Self {
        Self {
            depth: MAX_DEPTH as u8,
            move_time: Some(move_time),
            time_control: TimeControl::new(Some(move_time)),
        }
    }

    /// Both depth and clock.
    pub fn depth_and_time(depth: u8, move_time: Duration) -> Self {
        Self {
            depth,
            move_time: Some(move_time),
            time_control: TimeControl::new(Some(move_time)),
        }
    }

    /// Allocate a budget from a game clock: split the remaining time
    /// over the moves left to the next control, keep a 50ms safety
    /// margin, and spend the increment on top.
    pub fn from_clock(remaining: Duration, increment: Duration, moves_to_go: u32) -> Self {
        let slice = remaining / moves_to_go.max(1);
        let budget = slice.saturating_sub(Duration::from_millis(50)) + increment;
        Self::move_time(budget.max(Duration::from_millis(1)))
    }

    /// Has the clock told us to stop?
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.time_control.is_stopped()
    }

    /// Arm the clock. Call when the search begins.
    pub fn start(&self) {
        self.time_control.start();
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::depth(4)
    }
}

/// Cheaply-cloneable stop flag plus clock. `is_stopped` is a relaxed
/// atomic load so it can be polled from the search hot loop.
#[derive(Debug, Clone)]
pub struct TimeControl {
    stopped: Arc<AtomicBool>,
    start_time: Arc<std::sync::RwLock<Option<Instant>>>,
    time_limit: Option<Duration>,
    /// Poll the wall clock only every this many nodes.
    check_interval: u64,
}

impl TimeControl {
    pub fn new(time_limit: Option<Duration>) -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            start_time: Arc::new(std::sync::RwLock::new(None)),
            time_limit,
            check_interval: 2048,
        }
    }

    /// Start (or restart) the clock and clear the stop flag.
    pub fn start(&self) {
        *self.start_time.write().unwrap() = Some(Instant::now());
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Stop the search now.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Compare elapsed time against the limit, setting the stop flag
    /// on expiry. Returns true once stopped. This reads the wall
    /// clock, so call it every `check_interval` nodes, not every node.
    pub fn check_time(&self) -> bool {
        if self.is_stopped() {
            return true;
        }

        if let Some(limit) = self.time_limit {
            if let Some(start) = *self.start_time.read().unwrap() {
                if start.elapsed() >= limit {
                    self.stop();
                    return true;
                }
            }
        }

        false
    }

    /// True every `check_interval` nodes.
    #[inline]
    pub fn should_check_time(&self, nodes: u64) -> bool {
        nodes % self.check_interval == 0
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time
            .read()
            .unwrap()
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn remaining(&self) -> Option<Duration> {
        let limit = self.time_limit?;
        Some(limit.saturating_sub(self.elapsed()))
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
#[path = "time_control_tests.rs"]
mod time_control_tests;
