//! Error types for the session core.
//!
//! None of these are fatal: callers either surface them as a transient
//! signal (illegal moves) or recover by falling back to a fresh session.

use std::path::PathBuf;

/// Failure to parse a chess value from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChessError {
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("invalid piece: {0}")]
    InvalidPiece(char),

    #[error("invalid side: {0}")]
    InvalidSide(String),

    #[error("invalid FEN `{fen}`: {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("no opponent named `{0}` at this difficulty")]
    UnknownOpponent(String),
}

/// Rejection reported by the rules oracle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IllegalMove {
    #[error("the game is already over")]
    GameOver,

    #[error("no legal move from {from} to {to}")]
    NotLegal { from: String, to: String },

    #[error("{0} is not a valid promotion piece")]
    BadPromotion(char),
}

/// Errors from the engine collaborator
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine `{path}`: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine pipe unavailable: {0}")]
    Pipe(&'static str),

    #[error("engine is not running")]
    NotRunning,
}

/// Errors from durable key-value storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

/// Errors raised while rebuilding a session from a stored snapshot
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error(transparent)]
    Chess(#[from] ChessError),

    #[error("history is empty")]
    EmptyHistory,

    #[error("history cursor {cursor} out of range 1..={len}")]
    Cursor { cursor: usize, len: usize },

    #[error("stored position does not match history entry {cursor}")]
    PositionMismatch { cursor: usize },
}

/// A line of terminal input that is not a command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),

    #[error("`{command}` needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error(transparent)]
    Chess(#[from] ChessError),
}
