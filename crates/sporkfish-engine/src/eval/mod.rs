//! Static evaluation: tapered PeSTO piece-square tables.

pub mod pesto;
pub mod phase;
pub mod score;

use sporkfish_core::{Color, Position};

use crate::eval::pesto::pesto_value;
use crate::eval::phase::{game_phase, MAX_PHASE};
use crate::eval::score::Score;

/// Static score of a position in centipawns, from the side to move's point
/// of view: positive always means the player about to move is better.
///
/// Sums piece value + square bonus for every man on the board (White minus
/// Black), then blends the middlegame and endgame components by the material
/// phase. The king table entries of both sides carry the same large base
/// offset, which cancels in the difference.
pub fn evaluate(pos: &Position) -> i32 {
    let mut total = Score::ZERO;
    for (sq, piece, color) in pos.pieces() {
        let value = pesto_value(piece, sq, color);
        match color {
            Color::White => total += value,
            Color::Black => total -= value,
        }
    }

    let phase = game_phase(pos);
    let tapered =
        (total.mg() as i32 * phase + total.eg() as i32 * (MAX_PHASE - phase)) / MAX_PHASE;

    match pos.side_to_move() {
        Color::White => tapered,
        Color::Black => -tapered,
    }
}
