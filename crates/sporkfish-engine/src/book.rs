//! Opening book and endgame tablebase interfaces.
//!
//! The engine consults both through these traits and proceeds to a normal
//! search on any miss; the implementations (a PolyGlot file reader, a
//! network or on-disk tablebase probe) live with the driver.

use sporkfish_core::{ChessMove, Position};

/// An opening book keyed by position.
///
/// A PolyGlot-backed implementation holds weighted entries per position key;
/// the expected selection is the maximum-weight move, ties broken by file
/// order. `None` means no entry, never an error.
pub trait OpeningBook {
    /// The book move for `pos`, if the book knows this position.
    fn query(&self, pos: &Position) -> Option<ChessMove>;
}

/// Win/draw/loss from the probing side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wdl {
    /// The side to move wins with best play.
    Win,
    /// Drawn with best play.
    Draw,
    /// The side to move loses with best play.
    Loss,
}

/// A successful tablebase probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablebaseResult {
    /// Game-theoretic outcome for the side to move.
    pub wdl: Wdl,
    /// Distance to zeroing the halfmove clock with best play.
    pub dtz: i32,
    /// A move preserving the outcome, when the source provides one.
    pub best_move: Option<ChessMove>,
}

/// An endgame tablebase probe for positions with few men.
///
/// `None` means the position is not covered (too many men, missing table,
/// probe failure); the engine falls through to search, never errors.
pub trait EndgameTablebase {
    /// Probe `pos`.
    fn probe(&self, pos: &Position) -> Option<TablebaseResult>;
}
