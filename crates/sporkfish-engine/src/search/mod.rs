//! Search: iterative deepening with aspiration windows over the Negamax/PVS
//! core, plus the shared transposition table and the Lazy SMP pool.

pub mod control;
pub mod heuristics;
pub mod negamax;
pub mod ordering;
pub mod pool;
pub mod stats;
pub mod tt;

use sporkfish_core::{ChessMove, Position};

use crate::config::EngineConfig;
use control::SearchControl;
use negamax::{negamax, SearchContext, INF, MATE_THRESHOLD};
use stats::SearchStats;
use tt::TranspositionTable;

/// Aspiration half-window around the previous iteration's score.
const ASPIRATION_WINDOW: i32 = 50;

/// Snapshot published after each completed iteration, the raw material for a
/// driver's `info` output.
#[derive(Debug, Clone)]
pub struct IterationInfo<'a> {
    /// Depth just completed.
    pub depth: u8,
    /// Best move at that depth.
    pub best_move: ChessMove,
    /// Score in centipawns from the side to move.
    pub score: i32,
    /// Principal variation.
    pub pv: &'a [ChessMove],
    /// Nodes since the search started.
    pub nodes: u64,
}

/// Result of a finished search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best move of the deepest completed iteration, `None` when not even
    /// depth 1 finished inside the budget.
    pub best_move: Option<ChessMove>,
    /// Score of the deepest completed iteration.
    pub score: i32,
    /// Deepest completed depth; 0 when no iteration finished.
    pub depth: u8,
    /// Principal variation of the deepest completed iteration.
    pub pv: Vec<ChessMove>,
    /// Total nodes visited, all workers combined.
    pub nodes: u64,
    /// Merged search counters.
    pub stats: SearchStats,
}

impl SearchResult {
    fn empty() -> Self {
        Self {
            best_move: None,
            score: -INF,
            depth: 0,
            pv: Vec::new(),
            nodes: 0,
            stats: SearchStats::default(),
        }
    }
}

/// Iterative-deepening driver for one worker.
///
/// Borrows its configuration and the shared transposition table; owns
/// nothing across searches, so every invocation starts with fresh killers,
/// PV table, and statistics.
pub struct Searcher<'a> {
    config: &'a EngineConfig,
    tt: Option<&'a TranspositionTable>,
}

impl<'a> Searcher<'a> {
    /// A searcher over `tt`; pass `None` to search without a table.
    pub fn new(config: &'a EngineConfig, tt: Option<&'a TranspositionTable>) -> Self {
        Self { config, tt }
    }

    /// Run depths `1..=max_depth`, calling `on_iter` after each completed
    /// iteration. Returns the deepest completed result.
    pub fn run<F>(&self, pos: &Position, control: &SearchControl, on_iter: F) -> SearchResult
    where
        F: FnMut(IterationInfo<'_>),
    {
        self.run_from(pos, control, 1, on_iter)
    }

    /// As [`run`](Searcher::run), but starting at `start_depth`. Lazy SMP
    /// helpers start staggered so the workers diverge.
    pub fn run_from<F>(
        &self,
        pos: &Position,
        control: &SearchControl,
        start_depth: u8,
        mut on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(IterationInfo<'_>),
    {
        let mut ctx = SearchContext::new(self.config, self.tt, control);
        let mut result = SearchResult::empty();
        let mut prev_score = 0;

        for depth in start_depth..=self.config.max_depth {
            if control.should_stop_iterating() {
                break;
            }

            ctx.root_best = None;
            let score = aspiration_search(pos, depth, prev_score, &mut ctx);

            // An aborted iteration's partial result is discarded; the
            // previous completed iteration stands.
            if ctx.aborted() {
                break;
            }
            prev_score = score;

            let pv = ctx.pv.root_pv();
            let best_move = pv.first().copied().or(ctx.root_best);
            let Some(best_move) = best_move else {
                // No legal move at the root: mate or stalemate, nothing
                // deeper to learn.
                result.score = score;
                result.stats = ctx.stats;
                result.nodes = ctx.stats.nodes;
                break;
            };

            result.best_move = Some(best_move);
            result.score = score;
            result.depth = depth;
            result.pv = pv;
            result.nodes = ctx.stats.nodes;
            result.stats = ctx.stats;

            on_iter(IterationInfo {
                depth,
                best_move,
                score,
                pv: &result.pv,
                nodes: ctx.stats.nodes,
            });

            // A proven mate cannot improve with depth.
            if score.abs() >= MATE_THRESHOLD {
                break;
            }
        }

        result.nodes = ctx.stats.nodes;
        result.stats = ctx.stats;
        result
    }
}

/// One iteration with an aspiration window.
///
/// The first iteration and every post-mate iteration run full-window.
/// Otherwise the window opens `±ASPIRATION_WINDOW` around the previous
/// score; a fail widens the failed side to infinity, and a second fail at
/// the same depth falls back to the full window.
fn aspiration_search(
    pos: &Position,
    depth: u8,
    prev_score: i32,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    let full_window = !ctx.config.aspiration || depth <= 1 || prev_score.abs() >= MATE_THRESHOLD;
    let (mut alpha, mut beta) = if full_window {
        (-INF, INF)
    } else {
        (prev_score - ASPIRATION_WINDOW, prev_score + ASPIRATION_WINDOW)
    };

    let mut widenings = 0;
    loop {
        ctx.pv.reset(0);
        ctx.pv.reset(1);
        let score = negamax(pos, i32::from(depth), alpha, beta, 0, true, ctx);
        if ctx.aborted() {
            return score;
        }

        if score <= alpha {
            alpha = -INF;
        } else if score >= beta {
            beta = INF;
        } else {
            return score;
        }

        widenings += 1;
        if widenings >= 2 {
            alpha = -INF;
            beta = INF;
        }
    }
}
