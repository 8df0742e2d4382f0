//! Killer move table and triangular principal variation table.
//!
//! Both are owned by a single search context, never shared between workers.

use sporkfish_core::ChessMove;

use crate::search::negamax::MAX_PLY;

/// Two quiet moves per ply that most recently caused a beta cutoff there.
/// Slot 0 is the newest.
pub struct KillerTable {
    slots: [[Option<ChessMove>; 2]; MAX_PLY],
}

impl KillerTable {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            slots: [[None; 2]; MAX_PLY],
        }
    }

    /// Record a quiet cutoff move, shifting the previous newest to slot 1.
    pub fn store(&mut self, ply: usize, mv: ChessMove) {
        if ply >= MAX_PLY {
            return;
        }
        if self.slots[ply][0] != Some(mv) {
            self.slots[ply][1] = self.slots[ply][0];
            self.slots[ply][0] = Some(mv);
        }
    }

    /// The killer in `slot` (0 or 1) at `ply`.
    pub fn get(&self, ply: usize, slot: usize) -> Option<ChessMove> {
        if ply >= MAX_PLY {
            return None;
        }
        self.slots[ply][slot]
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.slots = [[None; 2]; MAX_PLY];
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Triangular PV table: each ply owns a line that is stitched into its
/// parent's whenever a move raises alpha, so after the search the root row
/// holds the full principal variation.
pub struct PvTable {
    length: [usize; MAX_PLY],
    lines: Box<[[Option<ChessMove>; MAX_PLY]]>,
}

impl PvTable {
    /// Empty table, all lines zero-length.
    pub fn new() -> Self {
        Self {
            length: [0; MAX_PLY],
            lines: vec![[None; MAX_PLY]; MAX_PLY].into_boxed_slice(),
        }
    }

    /// Truncate the line owned by `ply`. Called before searching each child
    /// so a stale sibling line cannot leak into the parent.
    pub fn reset(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.length[ply] = 0;
        }
    }

    /// `mv` raised alpha at `ply`: this ply's line becomes `mv` followed by
    /// the child's line.
    pub fn record(&mut self, ply: usize, mv: ChessMove) {
        if ply >= MAX_PLY {
            return;
        }
        if ply + 1 >= MAX_PLY {
            self.lines[ply][0] = Some(mv);
            self.length[ply] = 1;
            return;
        }

        let child_len = self.length[ply + 1].min(MAX_PLY - 1);
        let (head, tail) = self.lines.split_at_mut(ply + 1);
        let line = &mut head[ply];
        let child = &tail[0];
        line[0] = Some(mv);
        line[1..=child_len].copy_from_slice(&child[..child_len]);
        self.length[ply] = child_len + 1;
    }

    /// The principal variation from the root.
    pub fn root_pv(&self) -> Vec<ChessMove> {
        self.lines[0][..self.length[0]]
            .iter()
            .copied()
            .flatten()
            .collect()
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}
