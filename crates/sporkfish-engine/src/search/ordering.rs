//! Move ordering: TT move, MVV-LVA, killers, and the weighted composite.

use sporkfish_core::{ChessMove, Piece, Position};

use crate::config::{EngineConfig, MoveOrderMode};
use crate::search::heuristics::KillerTable;

/// Piece values for capture ordering, in centipawns.
const fn capture_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        // A king is never captured; as an attacker it ranks after the queen.
        Piece::King => 1_000,
    }
}

/// Score band that puts the TT move ahead of every heuristic score.
const TT_MOVE_SCORE: i32 = 10_000_000;

/// Base bonus for a killer slot hit; slot 0 gets double.
const KILLER_BASE: i32 = 1_000;

/// Centipawn value of the piece `mv` captures; en passant counts as a pawn.
/// Callers must only pass captures.
pub(crate) fn captured_value(pos: &Position, mv: ChessMove) -> i32 {
    pos.piece_at(mv.get_dest())
        .map_or(capture_value(Piece::Pawn), |(piece, _)| capture_value(piece))
}

/// Most Valuable Victim, Least Valuable Attacker: `1000 * victim - attacker`
/// for captures, 0 for quiet moves.
pub fn mvv_lva(pos: &Position, mv: ChessMove) -> i32 {
    if !pos.is_capture(mv) {
        return 0;
    }
    // En passant has an empty destination square; the victim is a pawn.
    let victim = pos
        .piece_at(mv.get_dest())
        .map_or(Piece::Pawn, |(piece, _)| piece);
    let attacker = pos
        .piece_at(mv.get_source())
        .map_or(Piece::Pawn, |(piece, _)| piece);
    1_000 * capture_value(victim) - capture_value(attacker)
}

/// Killer bonus: slot 0 beats slot 1, misses score zero.
fn killer_bonus(killers: &KillerTable, ply: usize, mv: ChessMove) -> i32 {
    if killers.get(ply, 0) == Some(mv) {
        2 * KILLER_BASE
    } else if killers.get(ply, 1) == Some(mv) {
        KILLER_BASE
    } else {
        0
    }
}

/// The pieces of engine state move scoring needs at one node.
pub struct OrderingContext<'a> {
    /// Ordering mode and source weights.
    pub config: &'a EngineConfig,
    /// Hash move from the transposition table, if any.
    pub tt_move: Option<ChessMove>,
    /// Killer table of the running search.
    pub killers: &'a KillerTable,
    /// Distance from the root.
    pub ply: usize,
}

impl OrderingContext<'_> {
    fn score(&self, pos: &Position, mv: ChessMove) -> i32 {
        if self.tt_move == Some(mv) {
            return TT_MOVE_SCORE;
        }
        match self.config.move_order {
            MoveOrderMode::MvvLva => mvv_lva(pos, mv),
            MoveOrderMode::Killer => killer_bonus(self.killers, self.ply, mv),
            MoveOrderMode::Composite => {
                let capture = self.config.mvv_lva_weight * mvv_lva(pos, mv) as f64;
                let killer =
                    self.config.killer_weight * killer_bonus(self.killers, self.ply, mv) as f64;
                (capture + killer) as i32
            }
        }
    }
}

/// Incremental move picker: scores the list up front, then yields moves in
/// descending score order by selection sort. Ties keep list order, so runs
/// are deterministic.
pub struct MovePicker {
    scored: Vec<(ChessMove, i32)>,
    cursor: usize,
}

impl MovePicker {
    /// Picker over all legal moves for the main search.
    pub fn new(pos: &Position, moves: &[ChessMove], ctx: &OrderingContext<'_>) -> Self {
        Self {
            scored: moves.iter().map(|&mv| (mv, ctx.score(pos, mv))).collect(),
            cursor: 0,
        }
    }

    /// Picker for quiescence: captures and queen promotions only, ordered by
    /// MVV-LVA. Pass `evasions = true` when in check to keep every move.
    pub fn new_qsearch(pos: &Position, moves: &[ChessMove], evasions: bool) -> Self {
        let scored = moves
            .iter()
            .filter(|&&mv| {
                evasions || pos.is_capture(mv) || mv.get_promotion() == Some(Piece::Queen)
            })
            .map(|&mv| (mv, mvv_lva(pos, mv)))
            .collect();
        Self { scored, cursor: 0 }
    }

    /// The next highest-scored move, or `None` when exhausted.
    pub fn pick_next(&mut self) -> Option<ChessMove> {
        if self.cursor >= self.scored.len() {
            return None;
        }

        let mut best = self.cursor;
        for i in (self.cursor + 1)..self.scored.len() {
            if self.scored[i].1 > self.scored[best].1 {
                best = i;
            }
        }
        self.scored.swap(self.cursor, best);

        let (mv, _) = self.scored[self.cursor];
        self.cursor += 1;
        Some(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn ordering_ctx<'a>(
        config: &'a EngineConfig,
        killers: &'a KillerTable,
        tt_move: Option<ChessMove>,
    ) -> OrderingContext<'a> {
        OrderingContext {
            config,
            tt_move,
            killers,
            ply: 0,
        }
    }

    fn mv(text: &str) -> ChessMove {
        text.parse().unwrap()
    }

    #[test]
    fn pawn_takes_queen_beats_queen_takes_pawn() {
        // White pawn on b4 can take the queen on c5; white queen on d4 can
        // take the pawn on d5.
        let pos = Position::from_fen("4k3/8/8/2qp4/1P1Q4/8/8/4K3 w - - 0 1").unwrap();
        let pxq = mvv_lva(&pos, mv("b4c5"));
        let qxp = mvv_lva(&pos, mv("d4d5"));
        assert!(pxq > qxp);
    }

    #[test]
    fn lighter_attacker_preferred_for_same_victim() {
        // Pawn, knight, and queen can all capture the rook on d5.
        let pos = Position::from_fen("4k3/8/8/3r4/2P1N3/8/8/3QK3 w - - 0 1").unwrap();
        let pxr = mvv_lva(&pos, mv("c4d5"));
        let nxr = mvv_lva(&pos, mv("e4d5"));
        let qxr = mvv_lva(&pos, mv("d1d5"));
        assert!(pxr > nxr);
        assert!(nxr > qxr);
    }

    #[test]
    fn quiet_moves_score_zero_in_mvv_lva() {
        let pos = Position::startpos();
        assert_eq!(mvv_lva(&pos, mv("e2e4")), 0);
    }

    #[test]
    fn en_passant_counts_as_pawn_takes_pawn() {
        let pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3")
                .unwrap();
        let ep = mvv_lva(&pos, mv("e5d6"));
        assert_eq!(ep, 1_000 * 100 - 100);
    }

    #[test]
    fn tt_move_comes_first() {
        let pos = Position::startpos();
        let moves = pos.legal_moves();
        let config = EngineConfig::default();
        let killers = KillerTable::new();
        let tt_move = moves[10];

        let ctx = ordering_ctx(&config, &killers, Some(tt_move));
        let mut picker = MovePicker::new(&pos, &moves, &ctx);
        assert_eq!(picker.pick_next(), Some(tt_move));
    }

    #[test]
    fn capture_comes_before_quiet() {
        // Queen on d4 can take the pawn on e5; everything else is quiet.
        let pos = Position::from_fen("4k3/8/8/4p3/3Q4/8/8/4K3 w - - 0 1").unwrap();
        let moves = pos.legal_moves();
        let config = EngineConfig::default();
        let killers = KillerTable::new();

        let ctx = ordering_ctx(&config, &killers, None);
        let mut picker = MovePicker::new(&pos, &moves, &ctx);
        let first = picker.pick_next().unwrap();
        assert!(pos.is_capture(first));
    }

    #[test]
    fn killer_mode_ranks_killers_first() {
        let pos = Position::startpos();
        let moves = pos.legal_moves();
        let config = EngineConfig {
            move_order: MoveOrderMode::Killer,
            ..Default::default()
        };
        let mut killers = KillerTable::new();
        killers.store(0, mv("b1c3"));
        killers.store(0, mv("g1f3"));

        let ctx = ordering_ctx(&config, &killers, None);
        let mut picker = MovePicker::new(&pos, &moves, &ctx);
        assert_eq!(picker.pick_next(), Some(mv("g1f3")), "slot 0 first");
        assert_eq!(picker.pick_next(), Some(mv("b1c3")), "slot 1 second");
    }

    #[test]
    fn composite_blends_captures_and_killers() {
        // Queen takes pawn available, plus a quiet killer.
        let pos = Position::from_fen("4k3/8/8/4p3/3Q4/8/8/4K3 w - - 0 1").unwrap();
        let moves = pos.legal_moves();
        let config = EngineConfig {
            move_order: MoveOrderMode::Composite,
            ..Default::default()
        };
        let mut killers = KillerTable::new();
        killers.store(0, mv("e1d1"));

        let ctx = ordering_ctx(&config, &killers, None);
        let mut picker = MovePicker::new(&pos, &moves, &ctx);
        assert_eq!(picker.pick_next(), Some(mv("d4e5")), "capture outranks killer");
        assert_eq!(picker.pick_next(), Some(mv("e1d1")), "killer outranks quiet");
    }

    #[test]
    fn zero_weight_disables_a_source() {
        let pos = Position::from_fen("4k3/8/8/4p3/3Q4/8/8/4K3 w - - 0 1").unwrap();
        let moves = pos.legal_moves();
        let config = EngineConfig {
            move_order: MoveOrderMode::Composite,
            mvv_lva_weight: 0.0,
            ..Default::default()
        };
        let mut killers = KillerTable::new();
        killers.store(0, mv("e1d1"));

        let ctx = ordering_ctx(&config, &killers, None);
        let mut picker = MovePicker::new(&pos, &moves, &ctx);
        assert_eq!(
            picker.pick_next(),
            Some(mv("e1d1")),
            "with MVV-LVA weight zero the killer leads"
        );
    }

    #[test]
    fn qsearch_picker_keeps_only_captures_and_queen_promotions() {
        let pos = Position::startpos();
        let moves = pos.legal_moves();
        let mut picker = MovePicker::new_qsearch(&pos, &moves, false);
        assert_eq!(picker.pick_next(), None, "no captures at the start");

        let promo = Position::from_fen("7k/4P3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let moves = promo.legal_moves();
        let mut picker = MovePicker::new_qsearch(&promo, &moves, false);
        let mut yielded = Vec::new();
        while let Some(m) = picker.pick_next() {
            yielded.push(m);
        }
        assert_eq!(yielded, vec![mv("e7e8q")], "only the queen promotion");
    }

    #[test]
    fn qsearch_evasions_keep_quiet_moves() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
        assert!(pos.is_check());
        let moves = pos.legal_moves();
        let mut picker = MovePicker::new_qsearch(&pos, &moves, true);
        let mut count = 0;
        while picker.pick_next().is_some() {
            count += 1;
        }
        assert_eq!(count, moves.len(), "in check every evasion is kept");
    }

    #[test]
    fn picker_yields_every_move_exactly_once() {
        let pos = Position::startpos();
        let moves = pos.legal_moves();
        let config = EngineConfig::default();
        let killers = KillerTable::new();
        let ctx = ordering_ctx(&config, &killers, None);

        let mut picker = MovePicker::new(&pos, &moves, &ctx);
        let mut seen = Vec::new();
        while let Some(m) = picker.pick_next() {
            seen.push(m);
        }
        assert_eq!(seen.len(), 20);
        seen.sort_by_key(|m| m.to_string());
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }
}
