//! Request/cancel adapter between the session and an [`Engine`].
//!
//! At most one move request and one hint request are outstanding. Every
//! request gets a fresh generation, so a reply is current only if its
//! ticket equals the one still held; everything else is stale and dropped.
//!
//! Once told to fall back, the bridge sends every further search to a
//! [`RandomEngine`] instead of the configured engine.

use tracing::{debug, info, warn};

use crate::domain::{Move, Position, StrengthProfile};
use crate::error::EngineError;
use crate::models::engine::{Engine, RandomEngine, RequestKind, SearchJob, Ticket};

/// A reply that still matters
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resolution {
    /// The opponent's move
    Move(Move),
    /// A suggestion for the user
    Hint(Move),
    /// The current request ended without a move
    Failed(RequestKind),
}

pub struct EngineBridge<E: Engine> {
    engine: E,
    fallback: Option<RandomEngine>,
    generation: u64,
    move_ticket: Option<Ticket>,
    hint_ticket: Option<Ticket>,
}

impl<E: Engine> EngineBridge<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            fallback: None,
            generation: 0,
            move_ticket: None,
            hint_ticket: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_falling_back(&self) -> bool {
        self.fallback.is_some()
    }

    /// Route every further search to random moves. Outstanding requests
    /// stay with the engine that received them.
    pub fn fall_back(&mut self) {
        if self.fallback.is_none() {
            info!("searching with random moves from now on");
            self.fallback = Some(RandomEngine::new());
        }
    }

    pub fn has_pending_move(&self) -> bool {
        self.move_ticket.is_some()
    }

    pub fn has_pending_hint(&self) -> bool {
        self.hint_ticket.is_some()
    }

    /// Ask for the opponent's move, superseding any earlier move request
    pub fn request_move(
        &mut self,
        position: &Position,
        strength: StrengthProfile,
    ) -> Result<Ticket, EngineError> {
        self.cancel_move();
        let ticket = self.issue(RequestKind::Move, position, strength)?;
        self.move_ticket = Some(ticket);
        Ok(ticket)
    }

    /// Ask for a hint, superseding any earlier hint request
    pub fn request_hint(
        &mut self,
        position: &Position,
        strength: StrengthProfile,
    ) -> Result<Ticket, EngineError> {
        self.cancel_hint();
        let ticket = self.issue(RequestKind::Hint, position, strength)?;
        self.hint_ticket = Some(ticket);
        Ok(ticket)
    }

    pub fn cancel_move(&mut self) {
        if let Some(ticket) = self.move_ticket.take() {
            self.cancel_ticket(ticket);
        }
    }

    pub fn cancel_hint(&mut self) {
        if let Some(ticket) = self.hint_ticket.take() {
            self.cancel_ticket(ticket);
        }
    }

    /// Cancel everything and tell the engine a new game begins
    pub fn new_game(&mut self) {
        self.cancel_move();
        self.cancel_hint();
        self.engine.new_game();
        if let Some(fallback) = &mut self.fallback {
            fallback.new_game();
        }
    }

    /// Current replies, in arrival order
    pub fn poll(&mut self) -> Vec<Resolution> {
        let mut replies = self.engine.poll();
        if let Some(fallback) = &mut self.fallback {
            replies.extend(fallback.poll());
        }

        let mut resolved = Vec::new();
        for reply in replies {
            let slot = match reply.ticket.kind {
                RequestKind::Move => &mut self.move_ticket,
                RequestKind::Hint => &mut self.hint_ticket,
            };
            if *slot != Some(reply.ticket) {
                debug!(ticket = ?reply.ticket, "discarding stale engine reply");
                continue;
            }
            *slot = None;

            match (reply.ticket.kind, reply.best_move) {
                (RequestKind::Move, Some(mv)) => resolved.push(Resolution::Move(mv)),
                (RequestKind::Hint, Some(mv)) => resolved.push(Resolution::Hint(mv)),
                (kind, None) => {
                    warn!(?kind, "engine answered without a move");
                    resolved.push(Resolution::Failed(kind));
                }
            }
        }
        resolved
    }

    fn issue(
        &mut self,
        kind: RequestKind,
        position: &Position,
        strength: StrengthProfile,
    ) -> Result<Ticket, EngineError> {
        self.generation += 1;
        let ticket = Ticket {
            kind,
            generation: self.generation,
        };
        let job = SearchJob {
            fen: position.fen().to_string(),
            strength,
        };
        match &mut self.fallback {
            Some(fallback) => fallback.search(ticket, job)?,
            None => self.engine.search(ticket, job)?,
        }
        Ok(ticket)
    }

    fn cancel_ticket(&mut self, ticket: Ticket) {
        self.engine.cancel(ticket);
        if let Some(fallback) = &mut self.fallback {
            fallback.cancel(ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RulesOracle, StandardRules};
    use crate::models::engine::ScriptedEngine;

    fn strength() -> StrengthProfile {
        StrengthProfile {
            skill_level: 3,
            depth: 2,
            move_time_ms: 100,
        }
    }

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    #[test]
    fn test_current_reply_resolves() {
        let mut bridge = EngineBridge::new(ScriptedEngine::new());
        let ticket = bridge.request_move(&Position::start(), strength()).unwrap();
        assert!(bridge.has_pending_move());
        assert_eq!(bridge.engine().searches[0].1.fen, Position::start().fen());

        bridge.engine_mut().answer(ticket, Some(mv("e2e4")));
        assert_eq!(bridge.poll(), vec![Resolution::Move(mv("e2e4"))]);
        assert!(!bridge.has_pending_move());
    }

    #[test]
    fn test_superseded_request_is_stale() {
        let mut bridge = EngineBridge::new(ScriptedEngine::new());
        let first = bridge.request_move(&Position::start(), strength()).unwrap();
        let second = bridge.request_move(&Position::start(), strength()).unwrap();
        assert!(second.generation > first.generation);
        assert_eq!(bridge.engine().cancelled, vec![first]);

        bridge.engine_mut().answer(first, Some(mv("d2d4")));
        bridge.engine_mut().answer(second, Some(mv("e2e4")));
        assert_eq!(bridge.poll(), vec![Resolution::Move(mv("e2e4"))]);
    }

    #[test]
    fn test_cancelled_reply_never_resolves() {
        let mut bridge = EngineBridge::new(ScriptedEngine::new());
        let ticket = bridge.request_move(&Position::start(), strength()).unwrap();
        bridge.cancel_move();
        bridge.engine_mut().answer(ticket, Some(mv("e2e4")));
        assert!(bridge.poll().is_empty());

        // a duplicate reply for an already resolved ticket is stale too
        let ticket = bridge.request_move(&Position::start(), strength()).unwrap();
        bridge.engine_mut().answer(ticket, Some(mv("e2e4")));
        bridge.engine_mut().answer(ticket, Some(mv("e2e4")));
        assert_eq!(bridge.poll().len(), 1);
    }

    #[test]
    fn test_hint_independent_of_move() {
        let mut bridge = EngineBridge::new(ScriptedEngine::new());
        let hint = bridge.request_hint(&Position::start(), strength()).unwrap();
        let request = bridge.request_move(&Position::start(), strength()).unwrap();
        bridge.cancel_move();
        bridge.engine_mut().answer(request, Some(mv("d2d4")));
        bridge.engine_mut().answer(hint, Some(mv("g1f3")));
        assert_eq!(bridge.poll(), vec![Resolution::Hint(mv("g1f3"))]);
    }

    #[test]
    fn test_no_move_reply_fails_request() {
        let mut bridge = EngineBridge::new(ScriptedEngine::new());
        let ticket = bridge.request_move(&Position::start(), strength()).unwrap();
        bridge.engine_mut().answer(ticket, None);
        assert_eq!(bridge.poll(), vec![Resolution::Failed(RequestKind::Move)]);
        assert!(!bridge.has_pending_move());

        // a stale empty answer is still just stale
        let old = bridge.request_hint(&Position::start(), strength()).unwrap();
        bridge.request_hint(&Position::start(), strength()).unwrap();
        bridge.engine_mut().answer(old, None);
        assert!(bridge.poll().is_empty());
        assert!(bridge.has_pending_hint());
    }

    #[test]
    fn test_fall_back_to_random_moves() {
        let mut engine = ScriptedEngine::new();
        engine.fail_searches = true;
        let mut bridge = EngineBridge::new(engine);
        assert!(bridge.request_move(&Position::start(), strength()).is_err());

        bridge.fall_back();
        assert!(bridge.is_falling_back());
        bridge.request_move(&Position::start(), strength()).unwrap();
        assert!(bridge.engine().searches.is_empty());

        let resolved = bridge.poll();
        let [Resolution::Move(played)] = resolved[..] else {
            panic!("expected one move, got {resolved:?}");
        };
        assert!(StandardRules::new().try_move(&Position::start(), &played).is_ok());
        assert!(!bridge.has_pending_move());
    }

    #[test]
    fn test_failed_request_leaves_nothing_pending() {
        let mut engine = ScriptedEngine::new();
        engine.fail_searches = true;
        let mut bridge = EngineBridge::new(engine);
        assert!(bridge.request_move(&Position::start(), strength()).is_err());
        assert!(!bridge.has_pending_move());
    }

    #[test]
    fn test_new_game_cancels_all() {
        let mut bridge = EngineBridge::new(ScriptedEngine::new());
        bridge.request_move(&Position::start(), strength()).unwrap();
        bridge.request_hint(&Position::start(), strength()).unwrap();
        bridge.new_game();
        assert!(!bridge.has_pending_move());
        assert!(!bridge.has_pending_hint());
        assert_eq!(bridge.engine().cancelled.len(), 2);
        assert_eq!(bridge.engine().new_games, 1);
    }
}
