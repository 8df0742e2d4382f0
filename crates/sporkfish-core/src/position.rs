//! Board position wrapper: copy-make move application, outcome detection,
//! and incremental Zobrist key maintenance.

use std::fmt;
use std::str::FromStr;

use chess::{
    BitBoard, Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square,
    ALL_SQUARES,
};

use crate::error::PositionError;
use crate::zobrist;

/// Light squares mask, used by insufficient-material detection.
const LIGHT_SQUARES: BitBoard = BitBoard(0x55AA_55AA_55AA_55AA);

/// How a finished game ended, from the point of view of the position itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The side to move is checkmated; `winner` is the other side.
    Checkmate {
        /// The side delivering mate.
        winner: Color,
    },
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// One hundred halfmoves without a capture or pawn move.
    FiftyMoveRule,
    /// Neither side retains mating material.
    InsufficientMaterial,
}

impl Outcome {
    /// Whether this outcome is a draw.
    pub fn is_draw(&self) -> bool {
        !matches!(self, Outcome::Checkmate { .. })
    }
}

/// A chess position with full game-state bookkeeping.
///
/// Wraps a [`chess::Board`] and adds the halfmove clock, fullmove number,
/// and an incrementally maintained Zobrist key. Moves are applied copy-make:
/// [`apply`](Position::apply) returns a new `Position`, leaving the original
/// untouched, so the search can lend positions down the tree freely.
#[derive(Clone, Copy)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    hash: u64,
}

impl Position {
    /// The standard starting position.
    pub fn startpos() -> Self {
        let board = Board::default();
        let mut pos = Self {
            board,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
        };
        pos.hash = zobrist::hash_from_scratch(&pos);
        pos
    }

    /// Parse a FEN string.
    ///
    /// Accepts 4 to 6 fields; missing counters default to `0 1`. The piece
    /// placement is validated by the underlying board (king counts, side not
    /// already delivering check, and so on).
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 || fields.len() > 6 {
            return Err(PositionError::InvalidFen {
                fen: fen.to_string(),
                reason: format!("expected 4 to 6 fields, found {}", fields.len()),
            });
        }

        let base = format!(
            "{} {} {} {} 0 1",
            fields[0], fields[1], fields[2], fields[3]
        );
        let board = Board::from_str(&base).map_err(|e| PositionError::InvalidFen {
            fen: fen.to_string(),
            reason: e.to_string(),
        })?;

        let halfmove_clock = match fields.get(4) {
            Some(s) => s.parse::<u32>().map_err(|_| PositionError::InvalidFen {
                fen: fen.to_string(),
                reason: format!("bad halfmove clock \"{s}\""),
            })?,
            None => 0,
        };
        let fullmove_number = match fields.get(5) {
            Some(s) => s.parse::<u32>().map_err(|_| PositionError::InvalidFen {
                fen: fen.to_string(),
                reason: format!("bad fullmove number \"{s}\""),
            })?,
            None => 1,
        };

        let mut pos = Self {
            board,
            halfmove_clock,
            fullmove_number,
            hash: 0,
        };
        pos.hash = zobrist::hash_from_scratch(&pos);
        Ok(pos)
    }

    /// Render the position as a FEN string.
    pub fn fen(&self) -> String {
        let mut out = String::with_capacity(80);

        for rank_idx in (0..8).rev() {
            let mut empty = 0;
            for file_idx in 0..8 {
                let sq = Square::make_square(Rank::from_index(rank_idx), File::from_index(file_idx));
                match self.piece_at(sq) {
                    Some((piece, color)) => {
                        if empty > 0 {
                            out.push(char::from_digit(empty, 10).unwrap_or('0'));
                            empty = 0;
                        }
                        out.push(piece_char(piece, color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from_digit(empty, 10).unwrap_or('0'));
            }
            if rank_idx > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(match self.side_to_move() {
            Color::White => 'w',
            Color::Black => 'b',
        });

        out.push(' ');
        let rights = self.castling_rights();
        if rights.iter().any(|&r| r) {
            const CHARS: [char; 4] = ['K', 'Q', 'k', 'q'];
            for (i, &held) in rights.iter().enumerate() {
                if held {
                    out.push(CHARS[i]);
                }
            }
        } else {
            out.push('-');
        }

        out.push(' ');
        match self.en_passant_file() {
            Some(file) => {
                // The capturable pawn sits on rank 4 or 5; the FEN field names
                // the square behind it.
                let rank = match self.side_to_move() {
                    Color::White => Rank::Sixth,
                    Color::Black => Rank::Third,
                };
                out.push_str(&format!("{}", Square::make_square(rank, file)));
            }
            None => out.push('-'),
        }

        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        out
    }

    /// The Zobrist key of this position.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The side to move.
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Halfmoves since the last capture or pawn move.
    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Fullmove number, starting at 1 and incremented after Black moves.
    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// The piece and its color on `sq`, if any.
    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        let piece = self.board.piece_on(sq)?;
        let color = self.board.color_on(sq)?;
        Some((piece, color))
    }

    /// All legal moves in this position.
    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    /// Every man on the board with its square and color.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece, Color)> + '_ {
        occupied_squares(self)
    }

    /// Number of pieces of `piece` kind on the board, both colors combined.
    #[inline]
    pub fn piece_count(&self, piece: Piece) -> u32 {
        self.board.pieces(piece).popcnt()
    }

    /// Whether the side to move is in check.
    #[inline]
    pub fn is_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    /// Whether `mv` captures a piece (including en passant).
    pub fn is_capture(&self, mv: ChessMove) -> bool {
        if self.board.piece_on(mv.get_dest()).is_some() {
            return true;
        }
        // A pawn changing file onto an empty square is an en passant capture.
        self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
    }

    /// Whether `mv` gives check to the opponent.
    pub fn gives_check(&self, mv: ChessMove) -> bool {
        self.board.make_move_new(mv).checkers().popcnt() > 0
    }

    /// Whether `mv` is quiet: no capture, no promotion.
    #[inline]
    pub fn is_quiet(&self, mv: ChessMove) -> bool {
        !self.is_capture(mv) && mv.get_promotion().is_none()
    }

    /// The file of the en passant target, if an en passant capture is possible.
    #[inline]
    pub fn en_passant_file(&self) -> Option<File> {
        self.board.en_passant().map(|sq| sq.get_file())
    }

    /// Castling rights as `[white kingside, white queenside, black kingside,
    /// black queenside]`.
    pub fn castling_rights(&self) -> [bool; 4] {
        let white = self.board.castle_rights(Color::White);
        let black = self.board.castle_rights(Color::Black);
        [
            white.has_kingside(),
            white.has_queenside(),
            black.has_kingside(),
            black.has_queenside(),
        ]
    }

    /// Whether `color` has any piece besides king and pawns.
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let side = self.board.color_combined(color);
        let non_pawn = *self.board.pieces(Piece::Knight)
            | *self.board.pieces(Piece::Bishop)
            | *self.board.pieces(Piece::Rook)
            | *self.board.pieces(Piece::Queen);
        (*side & non_pawn).popcnt() > 0
    }

    /// Total number of men on the board.
    #[inline]
    pub fn occupancy_count(&self) -> u32 {
        self.board.combined().popcnt()
    }

    /// Apply a legal move, returning the resulting position.
    ///
    /// The move must be legal; applying an illegal move leaves the underlying
    /// board in an inconsistent state. Callers that take untrusted input go
    /// through [`apply_checked`](Position::apply_checked).
    pub fn apply(&self, mv: ChessMove) -> Position {
        let capture = self.is_capture(mv);
        let pawn_move = self.board.piece_on(mv.get_source()) == Some(Piece::Pawn);

        let mut next = Position {
            board: self.board.make_move_new(mv),
            halfmove_clock: if capture || pawn_move {
                0
            } else {
                self.halfmove_clock + 1
            },
            fullmove_number: self.fullmove_number
                + u32::from(self.side_to_move() == Color::Black),
            hash: 0,
        };
        next.hash = zobrist::update(self, mv, &next);

        debug_assert_eq!(
            next.hash,
            zobrist::hash_from_scratch(&next),
            "incremental hash diverged after {mv}"
        );
        next
    }

    /// Apply a move after verifying it is legal.
    pub fn apply_checked(&self, mv: ChessMove) -> Result<Position, PositionError> {
        if MoveGen::new_legal(&self.board).any(|legal| legal == mv) {
            Ok(self.apply(mv))
        } else {
            Err(PositionError::IllegalMove {
                mv: mv.to_string(),
                fen: self.fen(),
            })
        }
    }

    /// Pass the move to the opponent without moving a piece.
    ///
    /// Returns `None` when the side to move is in check (a null move would be
    /// illegal there, and null-move pruning must not attempt it).
    pub fn apply_null(&self) -> Option<Position> {
        let board = self.board.null_move()?;
        let mut next = Position {
            board,
            halfmove_clock: self.halfmove_clock + 1,
            fullmove_number: self.fullmove_number
                + u32::from(self.side_to_move() == Color::Black),
            hash: 0,
        };
        next.hash = zobrist::update_null(self, &next);
        Some(next)
    }

    /// Classify the game state, or `None` while the game is still on.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.board.status() {
            BoardStatus::Checkmate => Some(Outcome::Checkmate {
                winner: !self.side_to_move(),
            }),
            BoardStatus::Stalemate => Some(Outcome::Stalemate),
            BoardStatus::Ongoing => {
                if self.halfmove_clock >= 100 {
                    Some(Outcome::FiftyMoveRule)
                } else if self.insufficient_material() {
                    Some(Outcome::InsufficientMaterial)
                } else {
                    None
                }
            }
        }
    }

    /// Whether the game has ended in this position.
    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.outcome().is_some()
    }

    /// Drawn by rule regardless of legal moves: fifty-move rule or
    /// insufficient material. Cheap enough to call at every search node,
    /// unlike [`outcome`](Position::outcome) which regenerates moves.
    #[inline]
    pub fn is_draw_by_rule(&self) -> bool {
        self.halfmove_clock >= 100 || self.insufficient_material()
    }

    /// Neither side can possibly deliver mate: bare kings, a lone minor
    /// piece, or bishops all on one square color.
    fn insufficient_material(&self) -> bool {
        let heavy = *self.board.pieces(Piece::Pawn)
            | *self.board.pieces(Piece::Rook)
            | *self.board.pieces(Piece::Queen);
        if heavy.popcnt() > 0 {
            return false;
        }

        let knights = self.board.pieces(Piece::Knight).popcnt();
        let bishops = *self.board.pieces(Piece::Bishop);
        if knights + bishops.popcnt() <= 1 {
            return true;
        }
        if knights == 0 {
            let light = (bishops & LIGHT_SQUARES).popcnt();
            return light == 0 || light == bishops.popcnt();
        }
        false
    }

    /// Parse a move in long algebraic notation (`e2e4`, `e7e8q`) and verify
    /// it is legal here.
    pub fn parse_move(&self, text: &str) -> Result<ChessMove, PositionError> {
        let mv = ChessMove::from_str(text).map_err(|_| PositionError::BadMoveText {
            text: text.to_string(),
        })?;
        if MoveGen::new_legal(&self.board).any(|legal| legal == mv) {
            Ok(mv)
        } else {
            Err(PositionError::IllegalMove {
                mv: text.to_string(),
                fen: self.fen(),
            })
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl FromStr for Position {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fen())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Position")
            .field("fen", &self.fen())
            .field("hash", &format_args!("{:#018x}", self.hash))
            .finish()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
    }
}

impl Eq for Position {}

/// FEN character for a colored piece.
fn piece_char(piece: Piece, color: Color) -> char {
    let c = match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    match color {
        Color::White => c.to_ascii_uppercase(),
        Color::Black => c,
    }
}

/// Iterate every occupied square with its piece.
pub(crate) fn occupied_squares(
    pos: &Position,
) -> impl Iterator<Item = (Square, Piece, Color)> + '_ {
    ALL_SQUARES
        .iter()
        .filter_map(move |&sq| pos.piece_at(sq).map(|(p, c)| (sq, p, c)))
}
