//! Opaque board snapshot.
//!
//! The session never looks inside a position except through the rules
//! oracle; it only compares, clones and round-trips them through FEN.

use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode};

use crate::error::ChessError;

/// FEN of the standard starting position
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A complete board state. Equality is FEN equality.
#[derive(Clone, Debug)]
pub struct Position {
    chess: Chess,
    fen: String,
}

impl Position {
    /// The standard starting position
    pub fn start() -> Self {
        Self::from_chess(Chess::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let invalid = |reason: String| ChessError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
        let chess: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;
        Ok(Self::from_chess(chess))
    }

    pub(crate) fn from_chess(chess: Chess) -> Self {
        let fen = Fen::from_position(&chess, EnPassantMode::Legal).to_string();
        Self { chess, fen }
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub(crate) fn chess(&self) -> &Chess {
        &self.chess
    }

    /// Placement, side to move, castling and en-passant fields.
    /// Two positions with the same key count as a repetition.
    pub fn repetition_key(&self) -> &str {
        let mut end = self.fen.len();
        for (seen, (idx, _)) in self.fen.match_indices(' ').enumerate() {
            if seen == 3 {
                end = idx;
                break;
            }
        }
        &self.fen[..end]
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.fen == other.fen
    }
}

impl Eq for Position {}
