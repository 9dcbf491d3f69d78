//! Pre-move queue.
//!
//! While the opponent is thinking the user may commit one move in advance.
//! It is replayed through the normal move pipeline once the user's turn
//! begins, and silently dropped if it has become illegal by then.

use shakmaty::Square;

/// A move committed before it was the user's turn
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PreMove {
    pub from: Square,
    pub to: Square,
}

/// Why a pre-move submission was refused
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum PreMoveRejected {
    #[error("it is already your turn")]
    UsersTurn,
    #[error("a pre-move is already queued")]
    AlreadyQueued,
    #[error("source and target are the same square")]
    SameSquare,
}

#[derive(Clone, Debug, Default)]
pub struct PreMoveQueue {
    /// Source square picked for the next pre-move, and where it may go
    source: Option<(Square, Vec<Square>)>,
    queued: Option<PreMove>,
    /// Turn change the pending execution belongs to
    armed: Option<u64>,
}

impl PreMoveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> Option<PreMove> {
        self.queued
    }

    pub fn selected_source(&self) -> Option<Square> {
        self.source.as_ref().map(|(from, _)| *from)
    }

    pub fn possible_targets(&self) -> &[Square] {
        self.source
            .as_ref()
            .map(|(_, targets)| targets.as_slice())
            .unwrap_or(&[])
    }

    /// Pick a source square and the targets to offer for it
    pub fn select(&mut self, from: Square, targets: Vec<Square>) {
        self.source = Some((from, targets));
    }

    pub fn clear_selection(&mut self) {
        self.source = None;
    }

    /// Queue a pre-move. Only allowed off-turn and when nothing is queued.
    pub fn submit(&mut self, from: Square, to: Square, users_turn: bool) -> Result<(), PreMoveRejected> {
        if users_turn {
            return Err(PreMoveRejected::UsersTurn);
        }
        if self.queued.is_some() {
            return Err(PreMoveRejected::AlreadyQueued);
        }
        if from == to {
            return Err(PreMoveRejected::SameSquare);
        }
        self.queued = Some(PreMove { from, to });
        self.source = None;
        Ok(())
    }

    /// Drop the queued move and any selection. Returns whether a move was queued.
    pub fn cancel(&mut self) -> bool {
        self.source = None;
        self.armed = None;
        self.queued.take().is_some()
    }

    /// Whether `square` is part of the queued move
    pub fn is_queued(&self, square: Square) -> bool {
        self.queued
            .is_some_and(|pm| pm.from == square || pm.to == square)
    }

    /// Whether `square` is an offered target for the selected source
    pub fn is_possible_target(&self, square: Square) -> bool {
        self.source
            .as_ref()
            .is_some_and(|(_, targets)| targets.contains(&square))
    }

    /// Claim the execution slot for turn change `turn_seq`. Returns false
    /// when nothing is queued or an execution is already pending, so a
    /// second turn change cannot submit the move twice.
    pub fn arm(&mut self, turn_seq: u64) -> bool {
        if self.queued.is_none() || self.armed.is_some() {
            return false;
        }
        self.armed = Some(turn_seq);
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Hand out the queued move for the armed turn change, clearing the
    /// queue whatever happens to the move afterwards.
    pub fn take_armed(&mut self, turn_seq: u64) -> Option<PreMove> {
        if self.armed != Some(turn_seq) {
            return None;
        }
        self.armed = None;
        self.source = None;
        self.queued.take()
    }
}
