//! Pawn promotion sub-state-machine.
//!
//! When a pawn move reaches the last rank without a chosen piece, the move
//! is parked here until the player picks a piece or cancels.

use shakmaty::Square;

/// A promotion move waiting for its piece
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PendingPromotion {
    pub from: Square,
    pub to: Square,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PromotionState {
    #[default]
    Idle,
    AwaitingChoice(PendingPromotion),
}

/// Idle -> AwaitingChoice -> Idle
#[derive(Clone, Debug, Default)]
pub struct PromotionFlow {
    state: PromotionState,
}

impl PromotionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PromotionState {
        self.state
    }

    pub fn pending(&self) -> Option<PendingPromotion> {
        match self.state {
            PromotionState::AwaitingChoice(pending) => Some(pending),
            PromotionState::Idle => None,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.pending().is_some()
    }

    /// Park a promotion move. Replaces a previous unanswered one.
    pub fn begin(&mut self, pending: PendingPromotion) {
        self.state = PromotionState::AwaitingChoice(pending);
    }

    /// Back to idle after the chosen piece was accepted
    pub fn complete(&mut self) {
        self.state = PromotionState::Idle;
    }

    /// Drop the parked move. Returns whether anything was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_awaiting();
        self.state = PromotionState::Idle;
        was_pending
    }
}
