//! Authoritative board state.
//!
//! `SessionState` owns the live position, the history ledger, the captured
//! pieces and the game status. It is the only thing that changes the
//! position, and it only does so after the rules oracle accepted a move.

use tracing::debug;

use crate::domain::{
    CapturedPiece, DrawReason, HistoryEntry, HistoryLedger, Move, MoveResult, PieceKind, Position,
    RulesOracle, Side,
};
use crate::error::{IllegalMove, SessionError};
use crate::models::persistence::SessionSnapshot;
use crate::models::promotion::PendingPromotion;

/// Where the game stands
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameStatus {
    InProgress { check: bool },
    Checkmate { winner: Side },
    Draw(DrawReason),
    Resigned { winner: Side },
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        !matches!(self, GameStatus::InProgress { .. })
    }

    pub fn winner(&self) -> Option<Side> {
        match self {
            GameStatus::Checkmate { winner } | GameStatus::Resigned { winner } => Some(*winner),
            _ => None,
        }
    }
}

impl Default for GameStatus {
    fn default() -> Self {
        GameStatus::InProgress { check: false }
    }
}

/// A move that made it onto the board
#[derive(Clone, Debug)]
pub struct AppliedMove {
    pub result: MoveResult,
    /// Side to move afterwards
    pub turn: Side,
    pub status: GameStatus,
}

/// Result of offering a move to the session
#[derive(Clone, Debug)]
pub enum MoveOutcome {
    Accepted(AppliedMove),
    Rejected(IllegalMove),
    /// Pawn reached its last rank and a piece must be chosen first
    AwaitingPromotion(PendingPromotion),
}

#[derive(Clone, Debug)]
pub struct SessionState {
    position: Position,
    turn: Side,
    history: HistoryLedger,
    captured: Vec<CapturedPiece>,
    last_move: Option<Move>,
    game_started: bool,
    status: GameStatus,
}

impl SessionState {
    pub fn new() -> Self {
        let position = Position::start();
        Self {
            history: HistoryLedger::new(position.clone()),
            position,
            turn: Side::White,
            captured: Vec::new(),
            last_move: None,
            game_started: false,
            status: GameStatus::default(),
        }
    }

    /// Rebuild from a stored snapshot, validating that its parts agree
    pub fn restore(
        rules: &impl RulesOracle,
        snapshot: &SessionSnapshot,
    ) -> Result<Self, SessionError> {
        snapshot.check_version()?;

        let mut entries = Vec::with_capacity(snapshot.history.len());
        for record in &snapshot.history {
            let position = Position::from_fen(&record.fen)?;
            let last_move = record.last_move.as_ref().map(Move::try_from).transpose()?;
            entries.push(HistoryEntry {
                position,
                last_move,
                san: record.san.clone(),
            });
        }
        let history = HistoryLedger::from_parts(entries, snapshot.current_move)?;

        let position = Position::from_fen(&snapshot.fen)?;
        if history.current().position != position {
            return Err(SessionError::PositionMismatch {
                cursor: snapshot.current_move,
            });
        }
        let last_move = snapshot
            .last_move
            .as_ref()
            .map(Move::try_from)
            .transpose()?;

        let mut session = Self {
            turn: rules.turn_of(&position),
            position,
            history,
            captured: snapshot.captured_pieces.clone(),
            last_move,
            game_started: snapshot.game_started,
            status: GameStatus::default(),
        };
        session.status = match snapshot.resigned {
            Some(loser) => GameStatus::Resigned {
                winner: loser.other(),
            },
            None => session.live_status(rules),
        };
        Ok(session)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Side to move in the live position
    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    pub fn captured(&self) -> &[CapturedPiece] {
        &self.captured
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    pub fn game_started(&self) -> bool {
        self.game_started
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_over(&self) -> bool {
        self.status.is_over()
    }

    /// Whether the cursor is on the newest history entry
    pub fn is_live(&self) -> bool {
        self.history.is_at_end()
    }

    /// The side that resigned, if the game ended that way
    pub fn resigned(&self) -> Option<Side> {
        match self.status {
            GameStatus::Resigned { winner } => Some(winner.other()),
            _ => None,
        }
    }

    /// Offer a move. Nothing changes unless the outcome is `Accepted`.
    pub fn apply_move(&mut self, rules: &impl RulesOracle, mv: Move) -> MoveOutcome {
        if self.is_over() {
            return MoveOutcome::Rejected(IllegalMove::GameOver);
        }

        if mv.promotion.is_none() && rules.is_promotion_move(&self.position, mv.from, mv.to) {
            // only ask for a piece if the move is legal with one
            return match rules.try_move(&self.position, &mv.with_promotion(PieceKind::Queen)) {
                Ok(_) => MoveOutcome::AwaitingPromotion(PendingPromotion {
                    from: mv.from,
                    to: mv.to,
                }),
                Err(e) => MoveOutcome::Rejected(e),
            };
        }

        match rules.try_move(&self.position, &mv) {
            Ok(result) => MoveOutcome::Accepted(self.commit(rules, result)),
            Err(e) => {
                debug!(%mv, error = %e, "move rejected");
                MoveOutcome::Rejected(e)
            }
        }
    }

    fn commit(&mut self, rules: &impl RulesOracle, result: MoveResult) -> AppliedMove {
        self.position = result.position.clone();
        self.turn = rules.turn_of(&self.position);
        self.history.append(HistoryEntry::new(
            result.position.clone(),
            result.played,
            result.san.clone(),
        ));
        if let Some(captured) = result.captured {
            self.captured.push(captured);
        }
        self.last_move = Some(result.played);
        self.game_started = true;
        self.status = self.live_status(rules);

        AppliedMove {
            turn: self.turn,
            status: self.status,
            result,
        }
    }

    /// Step the cursor back and load that position. False at the start.
    pub fn navigate_back(&mut self, rules: &impl RulesOracle) -> bool {
        let Some(entry) = self.history.move_back() else {
            return false;
        };
        let entry = entry.clone();
        self.load_entry(rules, entry);
        true
    }

    /// Step the cursor forward and load that position. False at the end.
    pub fn navigate_forward(&mut self, rules: &impl RulesOracle) -> bool {
        let Some(entry) = self.history.move_forward() else {
            return false;
        };
        let entry = entry.clone();
        self.load_entry(rules, entry);
        true
    }

    fn load_entry(&mut self, rules: &impl RulesOracle, entry: HistoryEntry) {
        self.position = entry.position;
        self.last_move = entry.last_move;
        self.turn = rules.turn_of(&self.position);
        // a finished game stays finished while its history is browsed
        if !self.is_over() {
            self.status = self.live_status(rules);
        }
    }

    /// End the game with `loser` resigning. False if it is already over.
    pub fn resign(&mut self, loser: Side) -> bool {
        if self.is_over() {
            return false;
        }
        self.status = GameStatus::Resigned {
            winner: loser.other(),
        };
        true
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Status of the live position, repetition included
    fn live_status(&self, rules: &impl RulesOracle) -> GameStatus {
        let verdict = rules.adjudicate(&self.position);
        if verdict.checkmate {
            return GameStatus::Checkmate {
                winner: self.turn.other(),
            };
        }
        if let Some(reason) = verdict.draw {
            return GameStatus::Draw(reason);
        }
        if self.history.repetitions_of(self.position.repetition_key()) >= 3 {
            return GameStatus::Draw(DrawReason::Repetition);
        }
        GameStatus::InProgress {
            check: verdict.check,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
