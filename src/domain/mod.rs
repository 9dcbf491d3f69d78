//! Pure domain layer: chess values, rules adjudication, history and
//! engine protocol. Nothing here performs I/O.

pub mod chess;
pub mod commentary;
pub mod history;
pub mod opponent;
pub mod oracle;
pub mod position;
pub mod uci;

pub use chess::{CapturedPiece, Move, PieceKind, Side, parse_square};
pub use commentary::Remark;
pub use history::{HistoryEntry, HistoryLedger};
pub use opponent::{Difficulty, OpponentProfile, StrengthProfile};
pub use oracle::{Adjudication, DrawReason, MoveResult, RulesOracle, StandardRules};
pub use position::{Position, START_FEN};
