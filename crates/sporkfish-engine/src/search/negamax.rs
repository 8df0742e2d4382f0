//! Fail-soft Negamax / PVS with quiescence and pruning heuristics.

use sporkfish_core::Position;

use crate::config::{EngineConfig, SearchMode};
use crate::eval::evaluate;
use crate::search::control::SearchControl;
use crate::search::heuristics::{KillerTable, PvTable};
use crate::search::ordering::{captured_value, MovePicker, OrderingContext};
use crate::search::stats::SearchStats;
use crate::search::tt::{Bound, TranspositionTable};

/// Recursion ceiling; per-ply tables are sized to this.
pub const MAX_PLY: usize = 128;

/// Mate score magnitude. A mate found `k` plies from the root scores
/// `MATE - k`, so shorter mates score higher.
pub const MATE: i32 = 100_000;

/// Scores at or beyond this magnitude encode a forced mate.
pub const MATE_THRESHOLD: i32 = MATE - MAX_PLY as i32;

/// Strictly outside every reachable score.
pub const INF: i32 = MATE + 1;

/// Delta pruning margin: a capture must bring the score within this of
/// alpha to be worth searching in quiescence.
const DELTA_MARGIN: i32 = 200;

/// Futility margins by remaining depth (index 0 unused).
const FUTILITY_MARGINS: [i32; 3] = [0, 150, 300];

/// Null-move depth reduction R; the null search runs at `depth - 1 - R`.
const NULL_MOVE_REDUCTION: i32 = 2;

/// State owned by one search invocation: per-ply tables, counters, and the
/// shared-resource handles. Dropped when the search returns.
pub(crate) struct SearchContext<'a> {
    pub config: &'a EngineConfig,
    pub tt: Option<&'a TranspositionTable>,
    pub control: &'a SearchControl,
    pub killers: KillerTable,
    pub pv: PvTable,
    pub stats: SearchStats,
    /// Best root move of the current iteration, kept out-of-band so an
    /// aborted iteration cannot clobber the previous one.
    pub root_best: Option<sporkfish_core::ChessMove>,
    use_pvs: bool,
    aborted: bool,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        config: &'a EngineConfig,
        tt: Option<&'a TranspositionTable>,
        control: &'a SearchControl,
    ) -> Self {
        Self {
            config,
            tt,
            control,
            killers: KillerTable::new(),
            pv: PvTable::new(),
            stats: SearchStats::default(),
            root_best: None,
            // The mode is fixed for the context's lifetime; PVS applies to
            // the single-threaded PVS mode only, SMP workers run plain
            // negamax.
            use_pvs: config.search_mode == SearchMode::PvsSingle,
            aborted: false,
        }
    }

    /// Whether the deadline or the stop flag ended this search.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Poll the control; latches the aborted flag once set.
    fn poll_abort(&mut self) -> bool {
        if !self.aborted && self.control.should_stop(self.stats.nodes) {
            self.aborted = true;
        }
        self.aborted
    }
}

/// Fail-soft negamax. May return scores outside `(alpha, beta)`.
///
/// On abort it unwinds immediately with a meaningless sentinel; callers must
/// check [`SearchContext::aborted`] before trusting any score.
pub(crate) fn negamax(
    pos: &Position,
    depth: i32,
    mut alpha: i32,
    beta: i32,
    ply: usize,
    allow_null: bool,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    ctx.stats.nodes += 1;
    if ctx.poll_abort() {
        return 0;
    }

    if pos.is_draw_by_rule() {
        return 0;
    }

    if depth <= 0 || ply >= MAX_PLY {
        return qsearch(pos, alpha, beta, ply, ctx);
    }

    let original_alpha = alpha;

    let mut tt_move = None;
    if let Some(tt) = ctx.tt {
        let probe = tt.probe(pos.hash(), depth as u8, alpha, beta, ply);
        tt_move = probe.best_move;
        // Root cutoffs are skipped: the root must search at least one move
        // so a best move and PV always exist.
        if ply > 0 {
            if let Some(score) = probe.cutoff {
                ctx.stats.tt_hits += 1;
                return score;
            }
        }
    }

    let moves = pos.legal_moves();
    if moves.is_empty() {
        return if pos.is_check() { -MATE + ply as i32 } else { 0 };
    }

    let in_check = pos.is_check();
    let static_eval = evaluate(pos);

    // Null move: hand the opponent a free move and search reduced. A score
    // still at or above beta means the position is strong enough to cut.
    // Skipped in check and in king-and-pawn endings, where zugzwang makes
    // the free-move assumption unsound.
    if allow_null
        && ctx.config.null_move
        && !in_check
        && depth >= 3
        && pos.has_non_pawn_material(pos.side_to_move())
    {
        if let Some(null_pos) = pos.apply_null() {
            let reduced = depth - 1 - NULL_MOVE_REDUCTION;
            let score = -negamax(&null_pos, reduced, -beta, -beta + 1, ply + 1, false, ctx);
            if ctx.aborted {
                return 0;
            }
            if score >= beta {
                ctx.stats.null_prunes += 1;
                return beta;
            }
        }
    }

    // Futility: at frontier depths in a null-window node, when the static
    // eval is hopelessly below alpha, quiet non-checking moves are skipped.
    let is_pv = beta - alpha > 1;
    let futile = ctx.config.futility
        && depth <= 2
        && !in_check
        && !is_pv
        && static_eval + FUTILITY_MARGINS[depth as usize] <= alpha;

    let ordering = OrderingContext {
        config: ctx.config,
        tt_move,
        killers: &ctx.killers,
        ply,
    };
    let mut picker = MovePicker::new(pos, &moves, &ordering);

    let mut best_score = -INF;
    let mut best_move = None;
    let mut searched = 0u32;

    while let Some(mv) = picker.pick_next() {
        if futile && searched > 0 && pos.is_quiet(mv) && !pos.gives_check(mv) {
            ctx.stats.futility_prunes += 1;
            continue;
        }

        let child = pos.apply(mv);
        ctx.pv.reset(ply + 1);

        let score = if ctx.use_pvs && searched > 0 {
            // Scout with a null window; a surprise inside the window forces
            // a full re-search.
            let mut s = -negamax(&child, depth - 1, -alpha - 1, -alpha, ply + 1, true, ctx);
            if !ctx.aborted && s > alpha && s < beta {
                ctx.pv.reset(ply + 1);
                s = -negamax(&child, depth - 1, -beta, -alpha, ply + 1, true, ctx);
            }
            s
        } else {
            -negamax(&child, depth - 1, -beta, -alpha, ply + 1, true, ctx)
        };

        if ctx.aborted {
            return 0;
        }
        searched += 1;

        if score > best_score {
            best_score = score;
            best_move = Some(mv);
            if ply == 0 {
                ctx.root_best = Some(mv);
            }
        }
        if score > alpha {
            alpha = score;
            ctx.pv.record(ply, mv);
        }
        if alpha >= beta {
            ctx.stats.beta_cutoffs += 1;
            if pos.is_quiet(mv) {
                ctx.killers.store(ply, mv);
            }
            break;
        }
    }

    debug_assert!(
        best_move.is_some(),
        "no move searched in a non-terminal position"
    );

    if let Some(tt) = ctx.tt {
        let bound = if best_score >= beta {
            Bound::Lower
        } else if best_score > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        tt.store(pos.hash(), depth as u8, best_score, bound, best_move, ply);
    }

    best_score
}

/// Quiescence: extend through captures (and queen promotions) until the
/// position is quiet, so the horizon never lands mid-exchange.
pub(crate) fn qsearch(
    pos: &Position,
    mut alpha: i32,
    beta: i32,
    ply: usize,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    ctx.stats.nodes += 1;
    ctx.stats.qnodes += 1;
    if ctx.poll_abort() {
        return evaluate(pos);
    }

    if pos.is_draw_by_rule() {
        return 0;
    }

    if ply >= MAX_PLY {
        return evaluate(pos);
    }

    let in_check = pos.is_check();
    let stand_pat = evaluate(pos);
    let mut best_score;

    let moves = pos.legal_moves();
    if in_check {
        // Every evasion must be searched; standing pat is not an option and
        // delta pruning is off for this node.
        if moves.is_empty() {
            return -MATE + ply as i32;
        }
        best_score = -INF;
    } else {
        if moves.is_empty() {
            return 0;
        }
        if stand_pat >= beta {
            return stand_pat;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
        best_score = stand_pat;
    }

    let mut picker = MovePicker::new_qsearch(pos, &moves, in_check);

    while let Some(mv) = picker.pick_next() {
        // Delta pruning: even winning this capture outright cannot bring the
        // score near alpha.
        if !in_check && ctx.config.delta && pos.is_capture(mv) {
            let gain = captured_value(pos, mv);
            if stand_pat + gain + DELTA_MARGIN < alpha {
                ctx.stats.delta_prunes += 1;
                continue;
            }
        }

        let child = pos.apply(mv);
        let score = -qsearch(&child, -beta, -alpha, ply + 1, ctx);
        if ctx.aborted {
            return best_score.max(stand_pat);
        }

        if score > best_score {
            best_score = score;
        }
        if score > alpha {
            alpha = score;
        }
        if score >= beta {
            return score;
        }
    }

    best_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn run(fen: &str, depth: i32, config: &EngineConfig) -> (i32, Option<String>) {
        let pos = Position::from_fen(fen).unwrap();
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_infinite(stopped);
        let mut ctx = SearchContext::new(config, None, &control);
        let score = negamax(&pos, depth, -INF, INF, 0, true, &mut ctx);
        (score, ctx.root_best.map(|m| m.to_string()))
    }

    #[test]
    fn finds_mate_in_one() {
        let config = EngineConfig::default();
        let (score, best) = run("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 3, &config);
        assert_eq!(best.as_deref(), Some("a1a8"));
        assert_eq!(score, MATE - 1);
    }

    #[test]
    fn mated_score_counts_plies() {
        // Back-rank mate already on the board: the mated side scores -MATE
        // at ply zero.
        let config = EngineConfig::default();
        let (score, _) = run("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1", 3, &config);
        assert_eq!(score, -MATE, "mated on the spot scores -MATE + 0");
    }

    #[test]
    fn drawn_position_scores_zero() {
        let config = EngineConfig::default();
        let (score, _) = run("8/8/4k3/8/8/4K3/8/8 w - - 0 1", 4, &config);
        assert_eq!(score, 0);
    }

    #[test]
    fn negamax_and_pvs_agree() {
        let fens = [
            "r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 4 5",
            "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        let negamax_cfg = EngineConfig {
            search_mode: SearchMode::NegamaxSingle,
            ..Default::default()
        };
        let pvs_cfg = EngineConfig {
            search_mode: SearchMode::PvsSingle,
            ..Default::default()
        };
        for fen in fens {
            let (plain, _) = run(fen, 4, &negamax_cfg);
            let (pvs, _) = run(fen, 4, &pvs_cfg);
            assert_eq!(plain, pvs, "PVS must match plain negamax on {fen}");
        }
    }

    #[test]
    fn zugzwang_null_move_guard() {
        // King and pawn ending where White's only legal move loses: the
        // black pawn promotes next. Null-move pruning is disabled here (no
        // non-pawn material), so the search must not fake a cutoff.
        let config = EngineConfig::default();
        let (score, best) = run("8/8/8/8/8/5k2/4p3/4K3 w - - 0 1", 5, &config);
        assert_eq!(best.as_deref(), Some("e1d2"), "the one legal move");
        assert!(score < -500, "White is lost in this ending, got {score}");
    }

    #[test]
    fn fail_soft_bounds_hold() {
        // Searched with a narrow window, the returned score must sit on the
        // correct side of the bound it failed against.
        let pos = Position::from_fen(
            "r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 4 5",
        )
        .unwrap();
        let config = EngineConfig::default();
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_infinite(stopped);

        let mut ctx = SearchContext::new(&config, None, &control);
        let wide = negamax(&pos, 3, -INF, INF, 0, true, &mut ctx);

        let mut ctx = SearchContext::new(&config, None, &control);
        let fail_low = negamax(&pos, 3, wide + 100, wide + 101, 0, true, &mut ctx);
        assert!(fail_low <= wide + 100, "must fail low against a high window");

        let mut ctx = SearchContext::new(&config, None, &control);
        let fail_high = negamax(&pos, 3, wide - 101, wide - 100, 0, true, &mut ctx);
        assert!(fail_high >= wide - 100, "must fail high against a low window");
    }

    #[test]
    fn qsearch_resolves_hanging_queen() {
        // White queen en prise on d4, Black to move: quiescence must see
        // the capture rather than trust the stand-pat score.
        let pos = Position::from_fen("4k3/8/8/4p3/3Q4/8/8/4K3 b - - 0 1").unwrap();
        let config = EngineConfig::default();
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_infinite(stopped);
        let mut ctx = SearchContext::new(&config, None, &control);
        let score = qsearch(&pos, -INF, INF, 0, &mut ctx);
        assert!(score > 300, "Black wins at least a queen for a pawn: {score}");
    }

    #[test]
    fn qsearch_in_check_finds_mate() {
        // Back-rank mate already delivered.
        let pos = Position::from_fen("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1").unwrap();
        let config = EngineConfig::default();
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_infinite(stopped);
        let mut ctx = SearchContext::new(&config, None, &control);
        assert_eq!(qsearch(&pos, -INF, INF, 0, &mut ctx), -MATE);
    }

    #[test]
    fn pruning_never_hides_scholars_mate() {
        // Every pruning heuristic enabled; the mating queen sacrifice-looking
        // capture must still surface with a mate score.
        let config = EngineConfig::default();
        let (score, best) = run(
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            4,
            &config,
        );
        assert_eq!(best.as_deref(), Some("h5f7"));
        assert!(score >= MATE_THRESHOLD, "mate score expected, got {score}");
    }
}
