//! Time management: turn a clock state into a per-move budget.

use std::time::Duration;

use crate::config::EngineConfig;

/// Never budget less than this, so every move gets a real search.
const MIN_BUDGET: Duration = Duration::from_millis(10);

/// Held back from the remaining clock to cover move transmission and
/// bookkeeping overhead.
const SAFETY: Duration = Duration::from_millis(50);

/// The game clock as seen by the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    /// Time left on our clock.
    pub remaining: Duration,
    /// Increment added after each of our moves.
    pub increment: Duration,
}

impl Clock {
    /// Convenience constructor from milliseconds.
    pub fn from_millis(remaining_ms: u64, increment_ms: u64) -> Self {
        Self {
            remaining: Duration::from_millis(remaining_ms),
            increment: Duration::from_millis(increment_ms),
        }
    }
}

/// Budget for the move about to be searched:
/// `time_weight * remaining + increment_weight * increment`, clamped between
/// [`MIN_BUDGET`] and the remaining clock less a safety reserve.
///
/// With the default weights of 0.1 and 0.01, a 5-minute blitz clock yields
/// roughly fifty moves before the budget dips under a second.
pub fn compute_budget(clock: &Clock, config: &EngineConfig) -> Duration {
    if clock.remaining <= MIN_BUDGET {
        return clock.remaining.max(Duration::from_millis(1));
    }

    let raw = config.time_weight * clock.remaining.as_millis() as f64
        + config.increment_weight * clock.increment.as_millis() as f64;
    let raw = Duration::from_millis(raw as u64);

    let ceiling = clock.remaining.saturating_sub(SAFETY).max(MIN_BUDGET);
    raw.clamp(MIN_BUDGET, ceiling)
}
