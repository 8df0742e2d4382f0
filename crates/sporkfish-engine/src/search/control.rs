//! Search control: the stop flag and the per-move deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wall-clock checks are this expensive relative to a node visit, so the
/// deadline is only consulted once per this many nodes.
const POLL_MASK: u64 = 4095;

/// Decides when a search must stop.
///
/// The search polls [`should_stop`](SearchControl::should_stop) inside the
/// tree and [`should_stop_iterating`](SearchControl::should_stop_iterating)
/// between iterative-deepening iterations. The external stop flag is shared
/// with the driver thread, which may set it at any time; the deadline is
/// fixed when the control is built.
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    start: Instant,
    budget: Option<Duration>,
}

impl SearchControl {
    /// No deadline; only the external stop flag ends the search.
    pub fn new_infinite(stopped: Arc<AtomicBool>) -> Self {
        Self {
            stopped,
            start: Instant::now(),
            budget: None,
        }
    }

    /// Deadline `budget` from now.
    pub fn new_timed(stopped: Arc<AtomicBool>, budget: Duration) -> Self {
        Self {
            stopped,
            start: Instant::now(),
            budget: Some(budget),
        }
    }

    /// Whether the search must abort now.
    ///
    /// The stop flag is checked on every call; the wall clock only every
    /// 4096 nodes. Once the deadline fires the flag is set, so later calls
    /// return `true` without touching the clock again.
    pub fn should_stop(&self, nodes: u64) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }

        if nodes & POLL_MASK != 0 {
            return false;
        }

        if let Some(budget) = self.budget {
            if self.start.elapsed() >= budget {
                self.stopped.store(true, Ordering::Release);
                return true;
            }
        }

        false
    }

    /// Whether iterative deepening should refuse to start another iteration.
    ///
    /// A deeper iteration costs several times the previous one, so once more
    /// than half the budget is spent the next iteration would almost surely
    /// be cut off mid-search and discarded.
    pub fn should_stop_iterating(&self) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        match self.budget {
            Some(budget) => self.start.elapsed() > budget / 2,
            None => false,
        }
    }

    /// Time since the control was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The shared stop flag.
    pub fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stopped
    }
}
