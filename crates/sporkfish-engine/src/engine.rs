//! The driver-facing engine: position management, book and tablebase
//! consultation, and synchronous search with a clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use sporkfish_core::{ChessMove, Position, PositionError};

use crate::book::{EndgameTablebase, OpeningBook, Wdl};
use crate::config::{ConfigError, EngineConfig};
use crate::eval::evaluate;
use crate::search::control::SearchControl;
use crate::search::negamax::MATE_THRESHOLD;
use crate::search::pool::ThreadPool;
use crate::time::{compute_budget, Clock};

/// What the engine found for one move request.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The move to play.
    pub best_move: ChessMove,
    /// Score in centipawns from the engine's side.
    pub score: i32,
    /// Deepest completed iteration; 0 when the move came from the book, a
    /// tablebase, or the static fallback.
    pub depth: u8,
    /// Principal variation.
    pub pv: Vec<ChessMove>,
    /// Nodes searched.
    pub nodes: u64,
    /// Wall time spent.
    pub elapsed: Duration,
}

/// Why no move could be produced.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The FEN or move list handed to the engine was invalid.
    #[error(transparent)]
    InvalidPosition(#[from] PositionError),
    /// The game is already decided at the root.
    #[error("no legal moves: {}", if *mated { "checkmate" } else { "stalemate" })]
    NoLegalMoves {
        /// True for checkmate, false for stalemate.
        mated: bool,
    },
}

/// A configured engine bound to one game at a time.
///
/// The search itself is synchronous: [`search`](Engine::search) blocks until
/// a move is chosen. [`stop`](Engine::stop) may be called from another
/// thread holding a clone of the handle's stop flag to end an in-flight
/// search early; the best completed iteration is returned.
pub struct Engine {
    config: EngineConfig,
    position: Position,
    pool: ThreadPool,
    stop: Arc<AtomicBool>,
    book: Option<Box<dyn OpeningBook + Send + Sync>>,
    tablebase: Option<Box<dyn EndgameTablebase + Send + Sync>>,
}

impl Engine {
    /// Build an engine after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            mode = ?config.search_mode,
            max_depth = config.max_depth,
            tt_capacity_log2 = config.tt_capacity_log2,
            "engine initialized"
        );
        Ok(Self {
            pool: ThreadPool::new(config.clone()),
            config,
            position: Position::startpos(),
            stop: Arc::new(AtomicBool::new(false)),
            book: None,
            tablebase: None,
        })
    }

    /// Attach an opening book.
    pub fn set_book(&mut self, book: Box<dyn OpeningBook + Send + Sync>) {
        self.book = Some(book);
    }

    /// Attach an endgame tablebase.
    pub fn set_tablebase(&mut self, tablebase: Box<dyn EndgameTablebase + Send + Sync>) {
        self.tablebase = Some(tablebase);
    }

    /// The engine's current root position.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Set the root from a FEN and a list of long-algebraic moves played
    /// after it.
    pub fn set_position(&mut self, fen: &str, moves: &[&str]) -> Result<(), PositionError> {
        let mut pos = Position::from_fen(fen)?;
        for text in moves {
            let mv = pos.parse_move(text)?;
            pos = pos.apply(mv);
        }
        self.position = pos;
        Ok(())
    }

    /// Start a new game: reset the root and age the transposition table so
    /// entries from the previous game lose their replacement priority.
    pub fn new_game(&mut self) {
        self.position = Position::startpos();
        self.pool.new_generation();
    }

    /// A clone of the stop flag, for a driver thread that needs to interrupt
    /// a search it is blocked on.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Ask an in-flight search to stop at its next poll.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Pick a move for the current position within the clock's budget.
    pub fn search(&mut self, clock: Clock) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();
        self.stop.store(false, Ordering::Release);

        if let Some(book) = &self.book {
            if let Some(mv) = book.query(&self.position) {
                debug!(%mv, "book hit");
                return Ok(SearchOutcome {
                    best_move: mv,
                    score: 0,
                    depth: 0,
                    pv: vec![mv],
                    nodes: 0,
                    elapsed: start.elapsed(),
                });
            }
        }

        let legal = self.position.legal_moves();
        if legal.is_empty() {
            return Err(SearchError::NoLegalMoves {
                mated: self.position.is_check(),
            });
        }

        if let Some(outcome) = self.position.outcome() {
            // Drawn on the spot (insufficient material or the fifty-move
            // rule) but moves still exist: report the draw and play one.
            info!(?outcome, "root position is already drawn");
            let best_move = best_static_move(&self.position, &legal);
            return Ok(SearchOutcome {
                best_move,
                score: 0,
                depth: 0,
                pv: vec![best_move],
                nodes: 0,
                elapsed: start.elapsed(),
            });
        }

        if let Some(tablebase) = &self.tablebase {
            if self.position.occupancy_count() <= self.config.tablebase_men {
                if let Some(hit) = tablebase.probe(&self.position) {
                    if let Some(mv) = hit.best_move {
                        debug!(wdl = ?hit.wdl, dtz = hit.dtz, "tablebase hit");
                        let score = match hit.wdl {
                            Wdl::Win => MATE_THRESHOLD,
                            Wdl::Draw => 0,
                            Wdl::Loss => -MATE_THRESHOLD,
                        };
                        return Ok(SearchOutcome {
                            best_move: mv,
                            score,
                            depth: 0,
                            pv: vec![mv],
                            nodes: 0,
                            elapsed: start.elapsed(),
                        });
                    }
                }
            }
        }

        let budget = compute_budget(&clock, &self.config);
        let control = SearchControl::new_timed(Arc::clone(&self.stop), budget);
        debug!(budget_ms = budget.as_millis() as u64, "search budget");

        let result = self.pool.search(&self.position, &control, |iter| {
            debug!(
                depth = iter.depth,
                score = iter.score,
                nodes = iter.nodes,
                pv = %format_pv(iter.pv),
                "iteration complete"
            );
        });

        let elapsed = start.elapsed();
        match result.best_move {
            Some(best_move) => Ok(SearchOutcome {
                best_move,
                score: result.score,
                depth: result.depth,
                pv: result.pv,
                nodes: result.nodes,
                elapsed,
            }),
            None => {
                // The deadline expired before depth 1 completed. Fall back
                // to the move the static evaluator likes best.
                warn!(
                    budget_ms = budget.as_millis() as u64,
                    "no iteration completed in budget; using static fallback"
                );
                let best_move = best_static_move(&self.position, &legal);
                Ok(SearchOutcome {
                    best_move,
                    score: -evaluate(&self.position.apply(best_move)),
                    depth: 0,
                    pv: vec![best_move],
                    nodes: result.nodes,
                    elapsed,
                })
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("position", &self.position)
            .field("pool", &self.pool)
            .field("book", &self.book.is_some())
            .field("tablebase", &self.tablebase.is_some())
            .finish()
    }
}

/// The legal move whose resulting position the evaluator likes best. The
/// child's score is from the opponent's point of view, hence the negation.
fn best_static_move(pos: &Position, legal: &[ChessMove]) -> ChessMove {
    legal
        .iter()
        .copied()
        .max_by_key(|&mv| -evaluate(&pos.apply(mv)))
        .expect("caller guarantees at least one legal move")
}

fn format_pv(pv: &[ChessMove]) -> String {
    pv.iter()
        .map(ChessMove::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig {
            max_depth: 3,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn set_position_applies_moves() {
        let mut engine = engine();
        engine
            .set_position(
                "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                &["e2e4", "e7e5"],
            )
            .unwrap();
        assert_eq!(
            engine.position().fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2"
        );
    }

    #[test]
    fn set_position_rejects_illegal_move() {
        let mut engine = engine();
        let err = engine.set_position(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            &["e2e5"],
        );
        assert!(err.is_err());
    }

    #[test]
    fn checkmate_root_reports_no_legal_moves() {
        let mut engine = engine();
        engine
            .set_position("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1", &[])
            .unwrap();
        let err = engine.search(Clock::from_millis(10_000, 0)).unwrap_err();
        assert!(matches!(err, SearchError::NoLegalMoves { mated: true }));
    }

    #[test]
    fn stalemate_root_reports_no_legal_moves() {
        let mut engine = engine();
        engine
            .set_position("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1", &[])
            .unwrap();
        let err = engine.search(Clock::from_millis(10_000, 0)).unwrap_err();
        assert!(matches!(err, SearchError::NoLegalMoves { mated: false }));
    }

    #[test]
    fn book_move_short_circuits_search() {
        struct OneLiner;
        impl OpeningBook for OneLiner {
            fn query(&self, pos: &Position) -> Option<ChessMove> {
                pos.parse_move("e2e4").ok()
            }
        }

        let mut engine = engine();
        engine.set_book(Box::new(OneLiner));
        let outcome = engine.search(Clock::from_millis(10_000, 0)).unwrap();
        assert_eq!(outcome.best_move.to_string(), "e2e4");
        assert_eq!(outcome.nodes, 0, "no search behind a book hit");
    }

    #[test]
    fn book_miss_falls_through_to_search() {
        struct EmptyBook;
        impl OpeningBook for EmptyBook {
            fn query(&self, _pos: &Position) -> Option<ChessMove> {
                None
            }
        }

        let mut engine = engine();
        engine.set_book(Box::new(EmptyBook));
        let outcome = engine.search(Clock::from_millis(10_000, 0)).unwrap();
        assert!(outcome.nodes > 0, "a miss must not stop the search");
    }

    #[test]
    fn tablebase_consulted_only_within_man_limit() {
        use crate::book::TablebaseResult;
        use std::sync::atomic::AtomicU32;

        struct CountingTablebase(Arc<AtomicU32>);
        impl EndgameTablebase for CountingTablebase {
            fn probe(&self, pos: &Position) -> Option<TablebaseResult> {
                self.0.fetch_add(1, Ordering::Relaxed);
                Some(TablebaseResult {
                    wdl: Wdl::Draw,
                    dtz: 0,
                    best_move: pos.legal_moves().first().copied(),
                })
            }
        }

        let probes = Arc::new(AtomicU32::new(0));

        // 32 men on the board: the tablebase must not be touched.
        let mut engine_full = engine();
        engine_full.set_tablebase(Box::new(CountingTablebase(Arc::clone(&probes))));
        engine_full.search(Clock::from_millis(10_000, 0)).unwrap();
        assert_eq!(probes.load(Ordering::Relaxed), 0);

        // Four men: probed, and the probe's move is played.
        let mut engine_endgame = engine();
        engine_endgame.set_tablebase(Box::new(CountingTablebase(Arc::clone(&probes))));
        engine_endgame
            .set_position("8/8/4k3/7r/8/4K3/7R/8 w - - 0 1", &[])
            .unwrap();
        let outcome = engine_endgame.search(Clock::from_millis(10_000, 0)).unwrap();
        assert_eq!(probes.load(Ordering::Relaxed), 1);
        assert_eq!(outcome.depth, 0, "tablebase hit bypasses the search");
    }

    #[test]
    fn drawn_root_returns_zero_and_a_move() {
        let mut engine = engine();
        engine
            .set_position("8/8/4k3/8/8/4K3/8/8 w - - 0 1", &[])
            .unwrap();
        let outcome = engine.search(Clock::from_millis(10_000, 0)).unwrap();
        assert_eq!(outcome.score, 0);
        // Only king moves exist in this position anyway.
        assert!(engine
            .position()
            .legal_moves()
            .contains(&outcome.best_move));
    }

    #[test]
    fn search_returns_within_budget_with_slack() {
        let mut engine = Engine::new(EngineConfig {
            max_depth: 64,
            ..Default::default()
        })
        .unwrap();
        // 2 s clock -> 200 ms budget. The slack covers the 4096-node poll
        // granularity, which dominates in unoptimized builds.
        let clock = Clock::from_millis(2_000, 0);
        let outcome = engine.search(clock).unwrap();
        assert!(
            outcome.elapsed <= Duration::from_millis(200 + 300),
            "deadline overshot: {:?}",
            outcome.elapsed
        );
    }

    #[test]
    fn opening_search_visits_real_tree() {
        let mut engine = Engine::new(EngineConfig {
            max_depth: 4,
            ..Default::default()
        })
        .unwrap();
        let outcome = engine.search(Clock::from_millis(10_000, 1_000)).unwrap();
        assert!(outcome.nodes > 1_000, "depth 4 from startpos, {} nodes", outcome.nodes);
        assert!(engine
            .position()
            .legal_moves()
            .contains(&outcome.best_move));
    }
}
