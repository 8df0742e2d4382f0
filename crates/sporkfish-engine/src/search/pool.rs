//! Lazy SMP: independent iterative-deepening workers over one shared
//! transposition table.

use sporkfish_core::Position;

use crate::config::{EngineConfig, SearchMode};
use crate::search::control::SearchControl;
use crate::search::tt::TranspositionTable;
use crate::search::{IterationInfo, SearchResult, Searcher};

/// Owns the transposition table and dispatches searches according to the
/// configured mode. Single-threaded modes run inline; SMP spawns scoped
/// workers that share nothing but the table and the stop flag.
pub struct ThreadPool {
    config: EngineConfig,
    tt: TranspositionTable,
}

impl ThreadPool {
    /// A pool sized from the configuration.
    pub fn new(config: EngineConfig) -> Self {
        let tt = TranspositionTable::new(config.tt_capacity_log2);
        Self { config, tt }
    }

    /// The shared transposition table.
    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// Age the table; called at the start of every root search and on new
    /// games.
    pub fn new_generation(&self) {
        self.tt.new_generation();
    }

    /// Drop every table entry.
    pub fn clear_tt(&self) {
        self.tt.clear();
    }

    /// Search `pos` until the control stops it or `max_depth` is reached.
    pub fn search<F>(&self, pos: &Position, control: &SearchControl, on_iter: F) -> SearchResult
    where
        F: FnMut(IterationInfo<'_>),
    {
        self.tt.new_generation();
        let tt = self.config.tt_enabled.then_some(&self.tt);

        match self.config.search_mode {
            SearchMode::NegamaxSingle | SearchMode::PvsSingle => {
                Searcher::new(&self.config, tt).run(pos, control, on_iter)
            }
            SearchMode::NegamaxSmp => self.search_smp(pos, control, on_iter),
        }
    }

    /// Thread 0 reports iterations; helpers search silently, staggered one
    /// ply apart so the workers diverge and seed the table with different
    /// subtrees. The deepest completed iteration wins, ties broken by score.
    fn search_smp<F>(&self, pos: &Position, control: &SearchControl, on_iter: F) -> SearchResult
    where
        F: FnMut(IterationInfo<'_>),
    {
        let tt = self.config.tt_enabled.then_some(&self.tt);
        let helpers = self.config.smp_threads.saturating_sub(1);

        let mut best = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(helpers);
            for thread_id in 1..=helpers {
                let config = &self.config;
                handles.push(scope.spawn(move || {
                    let start_depth = 1 + (thread_id % 2) as u8;
                    Searcher::new(config, tt).run_from(pos, control, start_depth, |_| {})
                }));
            }

            let mut best = Searcher::new(&self.config, tt).run(pos, control, on_iter);

            for handle in handles {
                let Ok(result) = handle.join() else { continue };
                best.nodes += result.nodes;
                best.stats.merge(&result.stats);
                if result.best_move.is_some()
                    && (result.depth, result.score) > (best.depth, best.score)
                {
                    let nodes = best.nodes;
                    let stats = best.stats;
                    best = result;
                    best.nodes = nodes;
                    best.stats = stats;
                }
            }
            best
        });

        // Helper nodes were merged into stats; keep the headline counter in
        // step with them.
        best.nodes = best.stats.nodes;
        best
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("tt", &self.tt)
            .field("mode", &self.config.search_mode)
            .field("threads", &self.config.smp_threads)
            .finish()
    }
}
