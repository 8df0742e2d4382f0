//! Typed engine configuration.
//!
//! Every recognized option is a field; deserializing a config with an
//! unrecognized key is an error (`deny_unknown_fields`), so a typo in a
//! driver's config file fails at load time instead of being silently ignored.

use serde::{Deserialize, Serialize};

use crate::search::negamax::MAX_PLY;

/// Which search algorithm drives the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMode {
    /// Plain fail-soft Negamax, one thread.
    NegamaxSingle,
    /// Lazy SMP: several Negamax workers sharing the transposition table.
    NegamaxSmp,
    /// Principal Variation Search, one thread.
    PvsSingle,
}

/// How the move list is ranked before searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveOrderMode {
    /// Captures first, most valuable victim / least valuable attacker.
    MvvLva,
    /// Killer moves first.
    Killer,
    /// Weighted sum of MVV-LVA and killer bonuses.
    Composite,
}

/// Engine options. All fields have working defaults; [`validate`] catches the
/// combinations the search cannot honor.
///
/// [`validate`]: EngineConfig::validate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Iterative deepening stops at this depth.
    pub max_depth: u8,
    /// Probe and fill the shared transposition table.
    pub tt_enabled: bool,
    /// Transposition table bucket count as a power of two.
    pub tt_capacity_log2: u32,
    /// Null-move pruning.
    pub null_move: bool,
    /// Futility pruning at frontier depths.
    pub futility: bool,
    /// Delta pruning in quiescence.
    pub delta: bool,
    /// Aspiration windows around the previous iteration's score.
    pub aspiration: bool,
    /// Move ordering strategy.
    pub move_order: MoveOrderMode,
    /// Weight of the MVV-LVA source in composite ordering. Zero disables it.
    pub mvv_lva_weight: f64,
    /// Weight of the killer source in composite ordering. Zero disables it.
    pub killer_weight: f64,
    /// Search algorithm.
    pub search_mode: SearchMode,
    /// Worker count for [`SearchMode::NegamaxSmp`].
    pub smp_threads: usize,
    /// Probe the endgame tablebase at or below this many men.
    pub tablebase_men: u32,
    /// Fraction of the remaining clock allocated to one move.
    pub time_weight: f64,
    /// Fraction of the increment allocated to one move.
    pub increment_weight: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            tt_enabled: true,
            tt_capacity_log2: 20,
            null_move: true,
            futility: true,
            delta: true,
            aspiration: true,
            move_order: MoveOrderMode::MvvLva,
            mvv_lva_weight: 2.0,
            killer_weight: 1.0,
            search_mode: SearchMode::PvsSingle,
            smp_threads: 4,
            tablebase_men: 6,
            time_weight: 0.1,
            increment_weight: 0.01,
        }
    }
}

impl EngineConfig {
    /// Check option values against what the search can actually honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroMaxDepth);
        }
        if usize::from(self.max_depth) >= MAX_PLY {
            return Err(ConfigError::MaxDepthTooDeep {
                max_depth: self.max_depth,
            });
        }
        if !(10..=30).contains(&self.tt_capacity_log2) {
            return Err(ConfigError::TtCapacityOutOfRange {
                log2: self.tt_capacity_log2,
            });
        }
        for (name, value) in [
            ("mvv_lva_weight", self.mvv_lva_weight),
            ("killer_weight", self.killer_weight),
            ("time_weight", self.time_weight),
            ("increment_weight", self.increment_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::BadWeight { name, value });
            }
        }
        if self.search_mode == SearchMode::NegamaxSmp && self.smp_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(())
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `max_depth` must be at least 1.
    #[error("max_depth must be at least 1")]
    ZeroMaxDepth,
    /// `max_depth` exceeds the search's ply ceiling.
    #[error("max_depth {max_depth} exceeds the {MAX_PLY}-ply search limit")]
    MaxDepthTooDeep {
        /// The rejected depth.
        max_depth: u8,
    },
    /// Transposition table capacity outside the supported range.
    #[error("tt_capacity_log2 {log2} outside supported range 10..=30")]
    TtCapacityOutOfRange {
        /// The rejected exponent.
        log2: u32,
    },
    /// A weight was negative, NaN, or infinite.
    #[error("{name} must be a finite non-negative number, got {value}")]
    BadWeight {
        /// Option name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// SMP mode requested with zero worker threads.
    #[error("NEGAMAX_SMP requires at least one thread")]
    ZeroThreads,
}
