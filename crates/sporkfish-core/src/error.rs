//! Error types for position construction and manipulation.

/// Errors from building or mutating a [`Position`](crate::Position).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// The FEN string could not be parsed or describes an illegal position.
    #[error("invalid FEN \"{fen}\": {reason}")]
    InvalidFen {
        /// The offending FEN string.
        fen: String,
        /// Human-readable parse failure description.
        reason: String,
    },
    /// A move is not legal in the position it was applied to.
    #[error("illegal move \"{mv}\" in position {fen}")]
    IllegalMove {
        /// The move in long algebraic notation.
        mv: String,
        /// FEN of the position the move was rejected in.
        fen: String,
    },
    /// A move string could not be parsed as long algebraic notation.
    #[error("unparseable move \"{text}\"")]
    BadMoveText {
        /// The offending move text.
        text: String,
    },
}
