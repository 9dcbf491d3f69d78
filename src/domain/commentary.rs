//! Opponent remarks after it moves.
//!
//! The situation is reduced to a closed set of [`Remark`]s by priority
//! (game end, check, capture, castle, promotion), then one canned line is
//! drawn at random.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::domain::oracle::MoveResult;

/// What the opponent is commenting on
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Remark {
    /// The opponent won, by mate or resignation
    Victory,
    /// The opponent was mated
    Defeat,
    Draw,
    Check,
    Capture,
    Castle,
    Promotion,
    Quiet,
}

impl Remark {
    /// Classify a move the opponent just made
    pub fn for_opponent_move(result: &MoveResult) -> Remark {
        if result.is_checkmate() {
            Remark::Victory
        } else if result.is_draw() {
            Remark::Draw
        } else if result.is_check() {
            Remark::Check
        } else if result.captured.is_some() {
            Remark::Capture
        } else if result.is_castle {
            Remark::Castle
        } else if result.is_promotion {
            Remark::Promotion
        } else {
            Remark::Quiet
        }
    }

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            Remark::Victory => &[
                "Checkmate. Good game!",
                "And that's mate. Want a rematch?",
            ],
            Remark::Defeat => &[
                "Well played, you got me.",
                "I did not see that coming. Congratulations!",
            ],
            Remark::Draw => &["A draw. Fair enough.", "Nobody wins this one."],
            Remark::Check => &["Check!", "Watch your king.", "Your king looks nervous."],
            Remark::Capture => &["I'll take that.", "Thanks for the material!", "Snack time."],
            Remark::Castle => &["Tucking my king away.", "Safety first."],
            Remark::Promotion => &["A new queen for me!", "Promotion time."],
            Remark::Quiet => &[
                "Your move.",
                "Let's see what you do with that.",
                "Hmm, interesting position.",
            ],
        }
    }

    /// Pick one line for this remark
    pub fn pick<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        self.lines().choose(rng).copied().unwrap_or("")
    }
}
