//! Lock-free transposition table.
//!
//! Each entry is two atomic words: the packed payload and `key ^ payload`.
//! Readers recover the key by XORing the two loads; a torn read (another
//! worker wrote between the loads) fails the check and reads as a miss, so
//! races degrade retrieval but can never corrupt a result. Writers never
//! synchronize.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use sporkfish_core::{ChessMove, File, Piece, Rank, Square};

use crate::search::negamax::MATE_THRESHOLD;

/// Bound carried by a stored score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Empty slot.
    None = 0,
    /// True minimax value at the stored depth.
    Exact = 1,
    /// Fail-high: the true value is at least the stored score.
    Lower = 2,
    /// Fail-low: the true value is at most the stored score.
    Upper = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0x03 {
            1 => Bound::Exact,
            2 => Bound::Lower,
            3 => Bound::Upper,
            _ => Bound::None,
        }
    }
}

/// Payload layout, low to high:
/// move(16) | depth(8) | bound(2) | generation(6) | score(32).
fn pack(mv: Option<ChessMove>, depth: u8, bound: Bound, generation: u8, score: i32) -> u64 {
    let mv_bits = mv.map_or(0, encode_move) as u64;
    mv_bits
        | (depth as u64) << 16
        | (bound as u64) << 24
        | ((generation & 0x3F) as u64) << 26
        | (score as u32 as u64) << 32
}

fn depth_of(data: u64) -> u8 {
    (data >> 16) as u8
}

fn bound_of(data: u64) -> Bound {
    Bound::from_bits(data >> 24)
}

fn generation_of(data: u64) -> u8 {
    ((data >> 26) & 0x3F) as u8
}

fn score_of(data: u64) -> i32 {
    (data >> 32) as u32 as i32
}

fn move_of(data: u64) -> Option<ChessMove> {
    decode_move(data as u16)
}

/// Compact move encoding: from(6) | to(6) | promotion(4). Zero is "no move";
/// no legal move encodes to zero because source and destination never
/// coincide.
pub(crate) fn encode_move(mv: ChessMove) -> u16 {
    let promo = match mv.get_promotion() {
        None => 0u16,
        Some(Piece::Knight) => 1,
        Some(Piece::Bishop) => 2,
        Some(Piece::Rook) => 3,
        _ => 4,
    };
    mv.get_source().to_index() as u16
        | (mv.get_dest().to_index() as u16) << 6
        | promo << 12
}

pub(crate) fn decode_move(bits: u16) -> Option<ChessMove> {
    if bits == 0 {
        return None;
    }
    let promotion = match (bits >> 12) & 0x0F {
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => None,
    };
    Some(ChessMove::new(
        square_from_index((bits & 63) as usize),
        square_from_index(((bits >> 6) & 63) as usize),
        promotion,
    ))
}

fn square_from_index(index: usize) -> Square {
    Square::make_square(Rank::from_index(index / 8), File::from_index(index % 8))
}

/// Convert a search score into its stored form.
///
/// Mate scores are path-dependent (`MATE - plies_from_root`); storing them as
/// distance-from-this-node makes the entry reusable from any path.
pub fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply as i32
    } else if score <= -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

/// Undo [`score_to_tt`] for the probing node's ply.
pub fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score - ply as i32
    } else if score <= -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

/// What a probe found.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtProbe {
    /// Best move from an earlier visit, returned on any key match for move
    /// ordering, whether or not the score is usable.
    pub best_move: Option<ChessMove>,
    /// A score that may be returned directly from this node, already
    /// ply-adjusted. Present only when the stored depth and bound admit it.
    pub cutoff: Option<i32>,
}

struct TtSlot {
    check: AtomicU64,
    data: AtomicU64,
}

/// Fixed-capacity shared transposition table.
pub struct TranspositionTable {
    slots: Box<[TtSlot]>,
    mask: usize,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Create a table with `2^capacity_log2` entries.
    pub fn new(capacity_log2: u32) -> Self {
        let capacity = 1usize << capacity_log2;
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || TtSlot {
            check: AtomicU64::new(0),
            data: AtomicU64::new(0),
        });
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            generation: AtomicU8::new(0),
        }
    }

    /// Number of entries.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Advance the generation. Called once per root search; entries from
    /// older generations become fair game for replacement.
    pub fn new_generation(&self) {
        let next = (self.generation.load(Ordering::Relaxed) + 1) & 0x3F;
        self.generation.store(next, Ordering::Relaxed);
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.data.store(0, Ordering::Relaxed);
            slot.check.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Look up `key`.
    ///
    /// The stored score becomes a cutoff only when the entry is at least as
    /// deep as the request and its bound applies against `(alpha, beta)`:
    /// exact scores always, lower bounds at or above beta, upper bounds at
    /// or below alpha.
    pub fn probe(&self, key: u64, depth: u8, alpha: i32, beta: i32, ply: usize) -> TtProbe {
        let slot = &self.slots[key as usize & self.mask];
        let data = slot.data.load(Ordering::Relaxed);
        let check = slot.check.load(Ordering::Relaxed);

        let bound = bound_of(data);
        if check ^ data != key || bound == Bound::None {
            return TtProbe::default();
        }

        let best_move = move_of(data);
        let mut cutoff = None;
        if depth_of(data) >= depth {
            let score = score_from_tt(score_of(data), ply);
            let usable = match bound {
                Bound::Exact => true,
                Bound::Lower => score >= beta,
                Bound::Upper => score <= alpha,
                Bound::None => false,
            };
            if usable {
                cutoff = Some(score);
            }
        }

        TtProbe { best_move, cutoff }
    }

    /// Store a result for `key`.
    ///
    /// Always replaces, except that a same-generation entry deeper than the
    /// new one is preserved so a long search cannot evict its own deep work.
    pub fn store(
        &self,
        key: u64,
        depth: u8,
        score: i32,
        bound: Bound,
        best_move: Option<ChessMove>,
        ply: usize,
    ) {
        let slot = &self.slots[key as usize & self.mask];
        let existing = slot.data.load(Ordering::Relaxed);
        let generation = self.generation.load(Ordering::Relaxed);

        if bound_of(existing) != Bound::None
            && generation_of(existing) == generation
            && depth_of(existing) > depth
        {
            return;
        }

        let data = pack(best_move, depth, bound, generation, score_to_tt(score, ply));
        slot.data.store(data, Ordering::Relaxed);
        slot.check.store(key ^ data, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("capacity", &self.slots.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
