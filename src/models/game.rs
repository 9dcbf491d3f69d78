//! Game model - the session aggregate.
//!
//! `GameModel` owns the board, clocks, promotion and pre-move state of one
//! game against one opponent. It performs no I/O: every operation returns
//! the [`Effect`]s an outer driver must carry out (persisting, talking to
//! the engine, scheduling wake-ups, redrawing). Engine replies and
//! scheduled wake-ups come back in as ordinary calls.
//!
//! Every turn change bumps a sequence number. Scheduled wake-ups carry the
//! number they were issued under and do nothing once it has moved on.

use std::time::{Duration, Instant};

use shakmaty::Square;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::domain::{
    Difficulty, Move, OpponentProfile, PieceKind, Position, Remark, RulesOracle, Side,
    StandardRules, StrengthProfile,
};
use crate::error::{ChessError, SessionError};
use crate::models::engine::RequestKind;
use crate::models::persistence::{HistoryRecord, MoveRecord, SNAPSHOT_VERSION, SessionSnapshot};
use crate::models::premove::PreMoveQueue;
use crate::models::promotion::PromotionFlow;
use crate::models::session::{AppliedMove, GameStatus, MoveOutcome, SessionState};
use crate::models::timer::TimerService;

/// Sound the board would play
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cue {
    MoveSelf,
    MoveOpponent,
    Capture,
    Castle,
    Promote,
    Check,
    GameEnd,
    Draw,
    Illegal,
    GameStart,
    /// A promotion piece must be picked
    Choice,
}

/// A deferred call back into the model
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Wake {
    PreMove { turn_seq: u64 },
    EngineMove { turn_seq: u64 },
}

/// Work the driver performs on the model's behalf
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Save [`GameModel::snapshot`]
    Persist,
    /// Save the selected opponent's name
    PersistOpponent(String),
    RequestEngineMove {
        position: Position,
        strength: StrengthProfile,
    },
    CancelEngineMove,
    RequestHint {
        position: Position,
        strength: StrengthProfile,
    },
    CancelHint,
    /// Tell the engine a new game begins
    NewGame,
    /// Send further searches to the built-in random mover
    FallBackEngine,
    /// Call [`GameModel::wake`] after `delay`
    Schedule { delay: Duration, wake: Wake },
    BoardChanged,
    Cue(Cue),
    Remark(Remark),
}

/// Who put a move on the board
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Origin {
    User,
    Promotion,
    PreMove,
    Engine,
}

pub struct GameModel<R: RulesOracle = StandardRules> {
    rules: R,
    config: SessionConfig,
    session: SessionState,
    timer: TimerService,
    promotion: PromotionFlow,
    premoves: PreMoveQueue,
    /// Colour the user plays
    player: Side,
    difficulty: Difficulty,
    opponent: OpponentProfile,
    /// Piece picked on the user's turn, with its legal targets
    selection: Option<(Square, Vec<Square>)>,
    hint: Option<Move>,
    /// An engine move is requested or scheduled
    engine_thinking: bool,
    hint_pending: bool,
    /// Move requests in a row that produced no playable move
    engine_failures: u32,
    turn_seq: u64,
}

impl GameModel<StandardRules> {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_rules(StandardRules::new(), config)
    }
}

impl<R: RulesOracle> GameModel<R> {
    /// A fresh game with the user playing white
    pub fn with_rules(rules: R, config: SessionConfig) -> Self {
        let difficulty = config.difficulty;
        let opponent = difficulty.resolve_opponent(config.opponent.as_deref());
        Self {
            rules,
            timer: TimerService::new(config.timer_defaults),
            config,
            session: SessionState::new(),
            promotion: PromotionFlow::new(),
            premoves: PreMoveQueue::new(),
            player: Side::White,
            difficulty,
            opponent,
            selection: None,
            hint: None,
            engine_thinking: false,
            hint_pending: false,
            engine_failures: 0,
            turn_seq: 0,
        }
    }

    /// Replace the whole game with a stored one. On error nothing changes.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        self.session = SessionState::restore(&self.rules, snapshot)?;
        self.timer = TimerService::restore(self.config.timer_defaults, snapshot.clocks.into());
        self.player = snapshot.player_color;
        self.difficulty = snapshot.difficulty;
        self.opponent = snapshot
            .difficulty
            .resolve_opponent(snapshot.opponent.as_deref());
        self.promotion.cancel();
        self.premoves.cancel();
        self.selection = None;
        self.hint = None;
        self.engine_thinking = false;
        self.hint_pending = false;
        self.engine_failures = 0;
        self.turn_seq += 1;
        info!(
            moves = self.session.history().len() - 1,
            opponent = %self.opponent.name,
            "restored saved game"
        );
        Ok(())
    }

    /// Get going after construction or restore: resume the clock and let
    /// the engine move if it is its turn.
    pub fn start(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = vec![Effect::BoardChanged];
        if self.session.is_over() {
            return effects;
        }
        if self.session.game_started() {
            self.timer.start(self.session.turn(), now);
        } else {
            effects.push(Effect::Cue(Cue::GameStart));
        }
        if self.engine_due() {
            if self.session.game_started() {
                self.request_engine_now(&mut effects);
            } else {
                self.schedule_engine(&mut effects, self.config.opening_engine_delay);
            }
        }
        effects
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn timer(&self) -> &TimerService {
        &self.timer
    }

    pub fn promotion(&self) -> &PromotionFlow {
        &self.promotion
    }

    pub fn premoves(&self) -> &PreMoveQueue {
        &self.premoves
    }

    pub fn player(&self) -> Side {
        self.player
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn opponent(&self) -> &OpponentProfile {
        &self.opponent
    }

    pub fn selected_square(&self) -> Option<Square> {
        self.selection.as_ref().map(|(square, _)| *square)
    }

    pub fn selected_targets(&self) -> &[Square] {
        self.selection
            .as_ref()
            .map(|(_, targets)| targets.as_slice())
            .unwrap_or(&[])
    }

    pub fn hint(&self) -> Option<Move> {
        self.hint
    }

    pub fn is_engine_thinking(&self) -> bool {
        self.engine_thinking
    }

    pub fn is_users_turn(&self) -> bool {
        self.session.turn() == self.player
    }

    /// Square click on the board
    pub fn click(&mut self, square: Square, now: Instant) -> Vec<Effect> {
        if self.session.is_over() || self.promotion.is_awaiting() {
            return Vec::new();
        }
        let own_piece = matches!(
            self.rules.piece_at(self.session.position(), square),
            Some((side, _)) if side == self.player
        );

        if self.is_users_turn() {
            if let Some((from, targets)) = &self.selection {
                if targets.contains(&square) {
                    let from = *from;
                    self.selection = None;
                    return self.play(Move::new(from, square), Origin::User, now);
                }
            }
            self.selection = if own_piece && self.selected_square() != Some(square) {
                let targets = self.rules.legal_targets(self.session.position(), square);
                Some((square, targets))
            } else {
                None
            };
            return vec![Effect::BoardChanged];
        }

        if !self.session.is_live() {
            return Vec::new();
        }
        if self.premoves.queued().is_some() {
            self.premoves.cancel();
            return vec![Effect::BoardChanged];
        }
        let users_turn = self.is_users_turn();
        match self.premoves.selected_source() {
            Some(from) if self.premoves.is_possible_target(square) => {
                if let Err(e) = self.premoves.submit(from, square, users_turn) {
                    debug!(error = %e, "pre-move refused");
                }
            }
            Some(from) if own_piece && from != square => self.select_premove_source(square),
            Some(_) => self.premoves.clear_selection(),
            None if own_piece => self.select_premove_source(square),
            None => return Vec::new(),
        }
        vec![Effect::BoardChanged]
    }

    fn select_premove_source(&mut self, square: Square) {
        let targets = self
            .rules
            .premove_targets(self.session.position(), square, self.player);
        self.premoves.select(square, targets);
    }

    /// A move typed by the user. Off-turn it is queued as a pre-move.
    pub fn submit_move(&mut self, mv: Move, now: Instant) -> Vec<Effect> {
        if self.session.is_over() || self.promotion.is_awaiting() {
            return vec![Effect::Cue(Cue::Illegal)];
        }
        if self.is_users_turn() {
            self.selection = None;
            return self.play(mv, Origin::User, now);
        }

        let own_piece = matches!(
            self.rules.piece_at(self.session.position(), mv.from),
            Some((side, _)) if side == self.player
        );
        if !self.session.is_live() || !own_piece {
            return vec![Effect::Cue(Cue::Illegal)];
        }
        let users_turn = self.is_users_turn();
        match self.premoves.submit(mv.from, mv.to, users_turn) {
            Ok(()) => vec![Effect::BoardChanged],
            Err(e) => {
                debug!(error = %e, "pre-move refused");
                vec![Effect::Cue(Cue::Illegal)]
            }
        }
    }

    /// Finish a parked promotion with `kind`
    pub fn choose_promotion(&mut self, kind: PieceKind, now: Instant) -> Vec<Effect> {
        let Some(pending) = self.promotion.pending() else {
            return Vec::new();
        };
        if !kind.is_promotion_choice() {
            return vec![Effect::Cue(Cue::Illegal)];
        }
        self.promotion.complete();
        let mv = Move::new(pending.from, pending.to).with_promotion(kind);
        match self.session.apply_move(&self.rules, mv) {
            MoveOutcome::Accepted(applied) => self.after_move(applied, Origin::Promotion, now),
            _ => vec![Effect::Cue(Cue::Illegal), Effect::BoardChanged],
        }
    }

    pub fn cancel_promotion(&mut self) -> Vec<Effect> {
        if self.promotion.cancel() {
            vec![Effect::BoardChanged]
        } else {
            Vec::new()
        }
    }

    /// Drop the queued pre-move or pre-move selection
    pub fn cancel_premove(&mut self) -> Vec<Effect> {
        let had_selection = self.premoves.selected_source().is_some();
        if self.premoves.cancel() || had_selection {
            vec![Effect::BoardChanged]
        } else {
            Vec::new()
        }
    }

    pub fn move_back(&mut self, now: Instant) -> Vec<Effect> {
        if !self.session.navigate_back(&self.rules) {
            return Vec::new();
        }
        self.after_navigation(now)
    }

    pub fn move_forward(&mut self, now: Instant) -> Vec<Effect> {
        if !self.session.navigate_forward(&self.rules) {
            return Vec::new();
        }
        self.after_navigation(now)
    }

    fn after_navigation(&mut self, now: Instant) -> Vec<Effect> {
        self.turn_seq += 1;
        let mut effects = self.drop_transients();
        if self.timer.running_side().is_some() {
            self.timer.switch_to(self.session.turn(), now);
        }
        effects.push(Effect::Persist);
        effects.push(Effect::BoardChanged);
        if self.engine_due() {
            self.request_engine_now(&mut effects);
        }
        effects
    }

    /// Start over with the same colour and opponent
    pub fn restart(&mut self, _now: Instant) -> Vec<Effect> {
        let mut effects = self.drop_transients();
        self.session.reset();
        self.timer.reset();
        self.engine_failures = 0;
        self.turn_seq += 1;
        info!(player = self.player.name(), opponent = %self.opponent.name, "new game");

        effects.extend([
            Effect::NewGame,
            Effect::Persist,
            Effect::BoardChanged,
            Effect::Cue(Cue::GameStart),
        ]);
        if self.engine_due() {
            self.schedule_engine(&mut effects, self.config.opening_engine_delay);
        }
        effects
    }

    /// Play the other colour. Starts a new game.
    pub fn set_color(&mut self, side: Side, now: Instant) -> Vec<Effect> {
        if side == self.player {
            return Vec::new();
        }
        self.player = side;
        self.restart(now)
    }

    /// Switch tier. Keeps the opponent if it belongs to the new tier,
    /// otherwise picks the tier's first. Starts a new game.
    pub fn set_difficulty(&mut self, difficulty: Difficulty, now: Instant) -> Vec<Effect> {
        if difficulty == self.difficulty {
            return Vec::new();
        }
        self.difficulty = difficulty;
        self.opponent = difficulty.resolve_opponent(Some(&self.opponent.name));
        let mut effects = vec![Effect::PersistOpponent(self.opponent.name.clone())];
        effects.extend(self.restart(now));
        effects
    }

    /// Pick an opponent of the current tier by name. Starts a new game.
    pub fn set_opponent(&mut self, name: &str, now: Instant) -> Result<Vec<Effect>, ChessError> {
        let profile = self
            .difficulty
            .roster()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ChessError::UnknownOpponent(name.to_string()))?;
        if profile == self.opponent {
            return Ok(Vec::new());
        }
        self.opponent = profile;
        let mut effects = vec![Effect::PersistOpponent(self.opponent.name.clone())];
        effects.extend(self.restart(now));
        Ok(effects)
    }

    pub fn resign(&mut self, now: Instant) -> Vec<Effect> {
        if !self.session.game_started() || !self.session.resign(self.player) {
            return Vec::new();
        }
        self.timer.end(now);
        self.turn_seq += 1;
        info!(player = self.player.name(), "user resigned");

        let mut effects = self.drop_transients();
        effects.extend([
            Effect::Persist,
            Effect::BoardChanged,
            Effect::Cue(Cue::GameEnd),
            Effect::Remark(Remark::Victory),
        ]);
        effects
    }

    /// Ask for a suggestion on the user's turn
    pub fn request_hint(&mut self) -> Vec<Effect> {
        let allowed = self.session.game_started()
            && !self.session.is_over()
            && self.session.is_live()
            && self.is_users_turn()
            && !self.promotion.is_awaiting();
        if !allowed {
            return Vec::new();
        }
        self.hint = None;
        self.hint_pending = true;
        vec![Effect::RequestHint {
            position: self.session.position().clone(),
            strength: self.config.hint_strength,
        }]
    }

    pub fn on_hint(&mut self, mv: Move) -> Vec<Effect> {
        self.hint_pending = false;
        if self.session.is_over() || !self.is_users_turn() {
            debug!(%mv, "ignoring hint for a finished turn");
            return Vec::new();
        }
        self.hint = Some(mv);
        vec![Effect::BoardChanged]
    }

    /// The engine's answer to the latest move request
    pub fn on_engine_move(&mut self, mv: Move, now: Instant) -> Vec<Effect> {
        self.engine_thinking = false;
        if !self.engine_due() {
            debug!(%mv, "ignoring engine move for a position that moved on");
            return Vec::new();
        }
        let position = self.session.position();
        let mv = if mv.promotion.is_none() && self.rules.is_promotion_move(position, mv.from, mv.to)
        {
            mv.with_promotion(PieceKind::Queen)
        } else {
            mv
        };
        self.play(mv, Origin::Engine, now)
    }

    /// A request could not be sent, or its answer carried no move
    pub fn on_engine_failure(&mut self, kind: RequestKind) -> Vec<Effect> {
        match kind {
            RequestKind::Hint => {
                self.hint_pending = false;
                Vec::new()
            }
            RequestKind::Move => {
                if !std::mem::take(&mut self.engine_thinking) || !self.engine_due() {
                    debug!("ignoring engine failure for a position that moved on");
                    return Vec::new();
                }
                self.retry_engine()
            }
        }
    }

    /// A scheduled wake-up fired
    pub fn wake(&mut self, wake: Wake, now: Instant) -> Vec<Effect> {
        match wake {
            Wake::PreMove { turn_seq } => self.run_premove(turn_seq, now),
            Wake::EngineMove { turn_seq } => {
                if turn_seq != self.turn_seq || !self.engine_due() {
                    debug!(turn_seq, "stale engine wake-up");
                    return Vec::new();
                }
                let mut effects = Vec::new();
                self.request_engine_now(&mut effects);
                effects
            }
        }
    }

    /// Periodic clock update
    pub fn tick(&mut self, now: Instant) {
        self.timer.tick(now);
    }

    /// The persisted form of this game
    pub fn snapshot(&self) -> SessionSnapshot {
        let history = self.session.history();
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            fen: self.session.position().fen().to_string(),
            player_color: self.player,
            difficulty: self.difficulty,
            opponent: Some(self.opponent.name.clone()),
            game_started: self.session.game_started(),
            history: history
                .entries()
                .iter()
                .map(|entry| HistoryRecord {
                    fen: entry.position.fen().to_string(),
                    last_move: entry.last_move.map(MoveRecord::from),
                    san: entry.san.clone(),
                })
                .collect(),
            current_move: history.cursor(),
            last_move: self.session.last_move().map(MoveRecord::from),
            captured_pieces: self.session.captured().to_vec(),
            clocks: self.timer.snapshot().into(),
            resigned: self.session.resigned(),
        }
    }

    fn run_premove(&mut self, turn_seq: u64, now: Instant) -> Vec<Effect> {
        let Some(premove) = self.premoves.take_armed(turn_seq) else {
            return Vec::new();
        };
        let playable = turn_seq == self.turn_seq
            && !self.promotion.is_awaiting()
            && !self.session.is_over()
            && self.session.is_live()
            && self.is_users_turn();
        if !playable {
            debug!(?premove, "dropping pre-move");
            return vec![Effect::BoardChanged];
        }

        let effects = self.play(Move::new(premove.from, premove.to), Origin::PreMove, now);
        if effects.is_empty() {
            vec![Effect::BoardChanged]
        } else {
            effects
        }
    }

    /// Whether the engine should be working on the live position
    fn engine_due(&self) -> bool {
        !self.session.is_over()
            && self.session.is_live()
            && !self.is_users_turn()
            && !self.promotion.is_awaiting()
    }

    fn request_engine_now(&mut self, effects: &mut Vec<Effect>) {
        self.engine_thinking = true;
        effects.push(Effect::RequestEngineMove {
            position: self.session.position().clone(),
            strength: self.opponent.strength,
        });
    }

    /// Ask again after a failed engine move; after too many failures in a
    /// row, random moves take over. The engine must be due.
    fn retry_engine(&mut self) -> Vec<Effect> {
        self.engine_failures += 1;
        let mut effects = Vec::new();
        if self.engine_failures > self.config.engine_retries {
            warn!(
                failures = self.engine_failures,
                "engine keeps failing, falling back to random moves"
            );
            effects.push(Effect::FallBackEngine);
            self.request_engine_now(&mut effects);
        } else {
            debug!(attempt = self.engine_failures, "asking the engine again");
            self.schedule_engine(&mut effects, self.config.engine_retry_delay);
        }
        effects
    }

    fn schedule_engine(&mut self, effects: &mut Vec<Effect>, delay: Duration) {
        self.engine_thinking = true;
        effects.push(Effect::Schedule {
            delay,
            wake: Wake::EngineMove {
                turn_seq: self.turn_seq,
            },
        });
    }

    /// Forget everything tied to the position that was just left
    fn drop_transients(&mut self) -> Vec<Effect> {
        self.promotion.cancel();
        self.premoves.cancel();
        self.selection = None;
        self.hint = None;

        let mut effects = Vec::new();
        if std::mem::take(&mut self.engine_thinking) {
            effects.push(Effect::CancelEngineMove);
        }
        if std::mem::take(&mut self.hint_pending) {
            effects.push(Effect::CancelHint);
        }
        effects
    }

    fn play(&mut self, mv: Move, origin: Origin, now: Instant) -> Vec<Effect> {
        match self.session.apply_move(&self.rules, mv) {
            MoveOutcome::Accepted(applied) => self.after_move(applied, origin, now),
            MoveOutcome::AwaitingPromotion(pending) if origin != Origin::Engine => {
                self.promotion.begin(pending);
                vec![Effect::Cue(Cue::Choice), Effect::BoardChanged]
            }
            MoveOutcome::AwaitingPromotion(_) => {
                warn!(%mv, "engine promotion without a piece");
                self.retry_engine()
            }
            MoveOutcome::Rejected(e) => match origin {
                Origin::PreMove => {
                    debug!(%mv, error = %e, "dropping pre-move");
                    Vec::new()
                }
                Origin::Engine => {
                    warn!(%mv, error = %e, "engine move rejected");
                    self.retry_engine()
                }
                Origin::User | Origin::Promotion => vec![Effect::Cue(Cue::Illegal)],
            },
        }
    }

    fn after_move(&mut self, applied: AppliedMove, origin: Origin, now: Instant) -> Vec<Effect> {
        self.turn_seq += 1;
        self.selection = None;
        self.hint = None;
        let mut effects = Vec::new();
        if std::mem::take(&mut self.hint_pending) {
            effects.push(Effect::CancelHint);
        }
        if origin == Origin::User {
            self.premoves.cancel();
        }

        if self.timer.running_side().is_some() {
            self.timer.switch_to(applied.turn, now);
        } else {
            self.timer.start(applied.turn, now);
        }
        if applied.status.is_over() {
            self.timer.end(now);
        }

        let by_user = origin != Origin::Engine;
        if !by_user {
            self.engine_failures = 0;
        }
        effects.push(Effect::Persist);
        effects.push(Effect::BoardChanged);
        effects.push(Effect::Cue(move_cue(&applied, by_user)));
        if !by_user {
            effects.push(Effect::Remark(Remark::for_opponent_move(&applied.result)));
        } else if matches!(applied.status, GameStatus::Checkmate { .. }) {
            effects.push(Effect::Remark(Remark::Defeat));
        } else if matches!(applied.status, GameStatus::Draw(_)) {
            effects.push(Effect::Remark(Remark::Draw));
        }

        if applied.status.is_over() {
            info!(status = ?applied.status, "game over");
            self.engine_thinking = false;
            self.premoves.cancel();
            return effects;
        }

        if applied.turn != self.player {
            if origin == Origin::Promotion {
                self.schedule_engine(&mut effects, self.config.promotion_engine_delay);
            } else {
                self.request_engine_now(&mut effects);
            }
        } else if self.premoves.arm(self.turn_seq) {
            effects.push(Effect::Schedule {
                delay: self.config.premove_delay,
                wake: Wake::PreMove {
                    turn_seq: self.turn_seq,
                },
            });
        }
        effects
    }
}

fn move_cue(applied: &AppliedMove, by_user: bool) -> Cue {
    let result = &applied.result;
    match applied.status {
        GameStatus::Checkmate { .. } | GameStatus::Resigned { .. } => Cue::GameEnd,
        GameStatus::Draw(_) => Cue::Draw,
        GameStatus::InProgress { check: true } => Cue::Check,
        GameStatus::InProgress { check: false } => {
            if result.is_promotion {
                Cue::Promote
            } else if result.is_castle {
                Cue::Castle
            } else if result.captured.is_some() {
                Cue::Capture
            } else if by_user {
                Cue::MoveSelf
            } else {
                Cue::MoveOpponent
            }
        }
    }
}
