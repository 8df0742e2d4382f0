//! Zobrist hashing: 781 fixed-seed random keys covering piece placement,
//! side to move, castling rights, and en passant files.
//!
//! Keys are generated at compile time from a fixed xorshift64 seed, so every
//! build hashes identically and searches are reproducible. The full hash and
//! the incremental [`update`] agree for every legal move; [`Position::apply`]
//! asserts this in debug builds.
//!
//! [`Position::apply`]: crate::Position::apply

use chess::{ChessMove, Color, File, Piece, Square};

use crate::position::{occupied_squares, Position};

const SEED: u64 = 0x5350_4f52_4b46_5348; // "SPORKFSH"

/// Xorshift64 step. Returns (value, next state).
const fn xorshift64(mut state: u64) -> (u64, u64) {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    (state, state)
}

/// Advance the generator `n` steps past the seed.
const fn skip(n: usize) -> u64 {
    let mut state = SEED;
    let mut i = 0;
    while i < n {
        let (_, next) = xorshift64(state);
        state = next;
        i += 1;
    }
    state
}

/// Keys for each (colored piece, square) pair: White P,N,B,R,Q,K then Black.
static PIECE_SQUARE: [[u64; 64]; 12] = {
    let mut table = [[0u64; 64]; 12];
    let mut state = SEED;
    let mut piece = 0;
    while piece < 12 {
        let mut sq = 0;
        while sq < 64 {
            let (val, next) = xorshift64(state);
            table[piece][sq] = val;
            state = next;
            sq += 1;
        }
        piece += 1;
    }
    table
};

/// Key XORed in when Black is to move.
static SIDE_TO_MOVE: u64 = {
    let (val, _) = xorshift64(skip(768));
    val
};

/// One key per castling right: WK, WQ, BK, BQ. The hash XORs the keys of the
/// rights currently held.
static CASTLING: [u64; 4] = {
    let mut table = [0u64; 4];
    let mut state = skip(769);
    let mut idx = 0;
    while idx < 4 {
        let (val, next) = xorshift64(state);
        table[idx] = val;
        state = next;
        idx += 1;
    }
    table
};

/// Keys for the en passant file, hashed only when a capture is possible.
static EN_PASSANT_FILE: [u64; 8] = {
    let mut table = [0u64; 8];
    let mut state = skip(773);
    let mut idx = 0;
    while idx < 8 {
        let (val, next) = xorshift64(state);
        table[idx] = val;
        state = next;
        idx += 1;
    }
    table
};

/// Key for a colored piece standing on a square.
#[inline]
fn piece_key(color: Color, piece: Piece, sq: Square) -> u64 {
    PIECE_SQUARE[color.to_index() * 6 + piece.to_index()][sq.to_index()]
}

/// Compute the Zobrist key of a position from scratch.
pub fn hash_from_scratch(pos: &Position) -> u64 {
    let mut hash = 0u64;

    for (sq, piece, color) in occupied_squares(pos) {
        hash ^= piece_key(color, piece, sq);
    }

    if pos.side_to_move() == Color::Black {
        hash ^= SIDE_TO_MOVE;
    }

    for (i, &held) in pos.castling_rights().iter().enumerate() {
        if held {
            hash ^= CASTLING[i];
        }
    }

    if let Some(file) = pos.en_passant_file() {
        hash ^= EN_PASSANT_FILE[file.to_index()];
    }

    hash
}

/// Incrementally update `prev`'s key for `mv`, given the resulting position.
///
/// Contract: `update(P, m, P.apply(m)) == hash_from_scratch(P.apply(m))` for
/// every legal move `m`. The resulting position is passed in rather than
/// recomputed because castling-right and en-passant deltas come straight off
/// its board state.
pub fn update(prev: &Position, mv: ChessMove, next: &Position) -> u64 {
    let mut hash = prev.hash();
    let us = prev.side_to_move();
    let src = mv.get_source();
    let dst = mv.get_dest();

    let (moved, _) = prev
        .piece_at(src)
        .expect("move source must be occupied in a legal move");

    hash ^= piece_key(us, moved, src);
    let placed = mv.get_promotion().unwrap_or(moved);
    hash ^= piece_key(us, placed, dst);

    if let Some((victim, victim_color)) = prev.piece_at(dst) {
        hash ^= piece_key(victim_color, victim, dst);
    } else if moved == Piece::Pawn && src.get_file() != dst.get_file() {
        // En passant: the captured pawn stands beside the destination.
        let captured_sq = Square::make_square(src.get_rank(), dst.get_file());
        hash ^= piece_key(!us, Piece::Pawn, captured_sq);
    }

    if moved == Piece::King {
        let from_file = src.get_file().to_index() as i32;
        let to_file = dst.get_file().to_index() as i32;
        if to_file - from_file == 2 {
            // Kingside castle: rook hops H -> F.
            hash ^= piece_key(us, Piece::Rook, Square::make_square(src.get_rank(), File::H));
            hash ^= piece_key(us, Piece::Rook, Square::make_square(src.get_rank(), File::F));
        } else if from_file - to_file == 2 {
            // Queenside castle: rook hops A -> D.
            hash ^= piece_key(us, Piece::Rook, Square::make_square(src.get_rank(), File::A));
            hash ^= piece_key(us, Piece::Rook, Square::make_square(src.get_rank(), File::D));
        }
    }

    hash ^= SIDE_TO_MOVE;
    hash ^= rights_delta(prev, next);
    hash ^= en_passant_delta(prev, next);
    hash
}

/// Incrementally update `prev`'s key for a null move.
pub(crate) fn update_null(prev: &Position, next: &Position) -> u64 {
    prev.hash() ^ SIDE_TO_MOVE ^ en_passant_delta(prev, next)
}

fn rights_delta(prev: &Position, next: &Position) -> u64 {
    let before = prev.castling_rights();
    let after = next.castling_rights();
    let mut delta = 0u64;
    for i in 0..4 {
        if before[i] != after[i] {
            delta ^= CASTLING[i];
        }
    }
    delta
}

fn en_passant_delta(prev: &Position, next: &Position) -> u64 {
    let mut delta = 0u64;
    if let Some(file) = prev.en_passant_file() {
        delta ^= EN_PASSANT_FILE[file.to_index()];
    }
    if let Some(file) = next.en_passant_file() {
        delta ^= EN_PASSANT_FILE[file.to_index()];
    }
    delta
}
