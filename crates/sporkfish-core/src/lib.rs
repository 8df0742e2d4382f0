//! Position service: board state, legal move access, game outcome detection,
//! and Zobrist hashing for the Sporkfish engine.
//!
//! The rules of chess themselves (move generation, legality, check detection)
//! are delegated to the `chess` crate; [`Position`] wraps its board with the
//! bookkeeping the engine needs on top: halfmove/fullmove counters, outcome
//! classification, and an incrementally maintained Zobrist key.

mod error;
mod position;
pub mod zobrist;

pub use error::PositionError;
pub use position::{Outcome, Position};

pub use chess::{ChessMove, Color, File, Piece, Rank, Square};
