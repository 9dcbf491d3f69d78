//! Terminal front end.
//!
//! [`Driver`] owns the game model together with its engine and storage
//! collaborators, and carries out the effects the model asks for. [`run`]
//! wires it to stdin/stdout: a reader thread feeds typed lines over a
//! channel and the main loop polls the engine and fires due wake-ups
//! between lines.

use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use rand::rngs::ThreadRng;
use shakmaty::Square;
use tracing::{debug, info, warn};

use crate::config::{Cli, SessionConfig};
use crate::domain::{Difficulty, Move, PieceKind, Side, parse_square};
use crate::error::CommandError;
use crate::models::bridge::{EngineBridge, Resolution};
use crate::models::engine::{Engine, RandomEngine, RequestKind, UciEngine};
use crate::models::game::{Cue, Effect, GameModel, Wake};
use crate::models::persistence::{FileStore, KeyValueStore, PersistenceGateway};
use crate::ui::{BoardView, render};

const HELP: &str = "\
commands:
  e2e4 | move e2e4      play a move (append q/r/b/n to promote)
  e2 | click e2         select a piece or a target square
  promote q|r|b|n       finish a pending promotion
  cancel                drop a pending promotion or the queued pre-move
  back | forward        step through the game
  restart               new game, same colour and opponent
  resign
  color white|black     play the other side (new game)
  difficulty <tier>     beginner .. grandmaster (new game)
  opponent <name>       pick an opponent of the current tier (new game)
  hint                  ask the engine for a suggestion
  board                 redraw
  quit";

/// One line of user input
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Move(Move),
    Click(Square),
    Promote(PieceKind),
    Cancel,
    Back,
    Forward,
    Restart,
    Resign,
    Color(Side),
    Difficulty(Difficulty),
    Opponent(String),
    Hint,
    Board,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let arg = |command: &'static str, what: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument { command, what })
            } else {
                Ok(rest)
            }
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "move" | "m" => Command::Move(arg("move", "a move like e2e4")?.parse()?),
            "click" | "c" => Command::Click(parse_square(arg("click", "a square")?)?),
            "promote" | "p" => {
                let piece = arg("promote", "a piece letter")?;
                let mut chars = piece.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Command::Promote(PieceKind::from_char(c)?),
                    _ => return Err(CommandError::Unknown(line.to_string())),
                }
            }
            "cancel" => Command::Cancel,
            "back" | "b" => Command::Back,
            "forward" | "f" => Command::Forward,
            "restart" | "new" => Command::Restart,
            "resign" => Command::Resign,
            "color" | "colour" => Command::Color(arg("color", "white or black")?.parse()?),
            "difficulty" => Command::Difficulty(arg("difficulty", "a tier")?.parse()?),
            "opponent" => Command::Opponent(arg("opponent", "a name")?.to_string()),
            "hint" => Command::Hint,
            "board" | "" => Command::Board,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ if rest.is_empty() && word.len() == 2 => Command::Click(parse_square(word)?),
            _ if rest.is_empty() => Command::Move(
                word.parse()
                    .map_err(|_| CommandError::Unknown(line.to_string()))?,
            ),
            _ => return Err(CommandError::Unknown(line.to_string())),
        };
        Ok(command)
    }
}

/// Runs a [`GameModel`] against real collaborators
pub struct Driver<E: Engine, S: KeyValueStore> {
    game: GameModel,
    bridge: EngineBridge<E>,
    persistence: PersistenceGateway<S>,
    /// Pending wake-ups and when they are due
    scheduled: Vec<(Instant, Wake)>,
    messages: Vec<String>,
    redraw: bool,
    rng: ThreadRng,
}

impl<E: Engine, S: KeyValueStore> Driver<E, S> {
    pub fn new(game: GameModel, engine: E, persistence: PersistenceGateway<S>) -> Self {
        Self {
            game,
            bridge: EngineBridge::new(engine),
            persistence,
            scheduled: Vec::new(),
            messages: Vec::new(),
            redraw: false,
            rng: rand::rng(),
        }
    }

    pub fn game(&self) -> &GameModel {
        &self.game
    }

    pub fn bridge(&self) -> &EngineBridge<E> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut EngineBridge<E> {
        &mut self.bridge
    }

    pub fn persistence(&self) -> &PersistenceGateway<S> {
        &self.persistence
    }

    /// Earliest pending wake-up
    pub fn next_wake(&self) -> Option<Instant> {
        self.scheduled.iter().map(|(at, _)| *at).min()
    }

    /// Lines for the user since the last call
    pub fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    /// Whether the board changed since the last call
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    pub fn start(&mut self, now: Instant) {
        let effects = self.game.start(now);
        self.apply(effects, now);
    }

    /// Carry out a user command. Returns false on quit.
    pub fn handle(&mut self, command: Command, now: Instant) -> bool {
        let effects = match command {
            Command::Move(mv) => self.game.submit_move(mv, now),
            Command::Click(square) => self.game.click(square, now),
            Command::Promote(kind) => self.game.choose_promotion(kind, now),
            Command::Cancel if self.game.promotion().is_awaiting() => {
                self.game.cancel_promotion()
            }
            Command::Cancel => self.game.cancel_premove(),
            Command::Back => self.game.move_back(now),
            Command::Forward => self.game.move_forward(now),
            Command::Restart => self.game.restart(now),
            Command::Resign => self.game.resign(now),
            Command::Color(side) => self.game.set_color(side, now),
            Command::Difficulty(difficulty) => self.game.set_difficulty(difficulty, now),
            Command::Opponent(name) => match self.game.set_opponent(&name, now) {
                Ok(effects) => effects,
                Err(e) => {
                    self.messages.push(e.to_string());
                    Vec::new()
                }
            },
            Command::Hint => self.game.request_hint(),
            Command::Board => {
                self.redraw = true;
                Vec::new()
            }
            Command::Help => {
                self.messages.push(HELP.to_string());
                Vec::new()
            }
            Command::Quit => return false,
        };
        self.apply(effects, now);
        true
    }

    /// Deliver engine replies, fire due wake-ups and advance the clocks
    pub fn pump(&mut self, now: Instant) {
        for resolution in self.bridge.poll() {
            let effects = match resolution {
                Resolution::Move(mv) => self.game.on_engine_move(mv, now),
                Resolution::Hint(mv) => self.game.on_hint(mv),
                Resolution::Failed(kind) => {
                    if kind == RequestKind::Hint {
                        self.messages.push("no hint available".to_string());
                    }
                    self.game.on_engine_failure(kind)
                }
            };
            self.apply(effects, now);
        }

        let mut due: Vec<(Instant, Wake)> = Vec::new();
        self.scheduled.retain(|entry| {
            if entry.0 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(at, _)| *at);
        for (_, wake) in due {
            let effects = self.game.wake(wake, now);
            self.apply(effects, now);
        }

        self.game.tick(now);
    }

    /// Save the game as it stands, clocks included
    pub fn persist(&mut self) {
        if let Err(e) = self.persistence.save(&self.game.snapshot()) {
            warn!(error = %e, "could not save game");
        }
    }

    fn apply(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::Persist => self.persist(),
                Effect::PersistOpponent(name) => {
                    if let Err(e) = self.persistence.save_opponent(&name) {
                        warn!(error = %e, "could not save selected opponent");
                    }
                }
                Effect::RequestEngineMove { position, strength } => {
                    if let Err(e) = self.bridge.request_move(&position, strength) {
                        warn!(error = %e, "engine move request failed");
                        self.messages.push(format!("engine unavailable: {e}"));
                        let effects = self.game.on_engine_failure(RequestKind::Move);
                        self.apply(effects, now);
                    }
                }
                Effect::CancelEngineMove => self.bridge.cancel_move(),
                Effect::RequestHint { position, strength } => {
                    if let Err(e) = self.bridge.request_hint(&position, strength) {
                        warn!(error = %e, "hint request failed");
                        self.messages.push(format!("no hint available: {e}"));
                        let effects = self.game.on_engine_failure(RequestKind::Hint);
                        self.apply(effects, now);
                    }
                }
                Effect::CancelHint => self.bridge.cancel_hint(),
                Effect::NewGame => {
                    self.scheduled.clear();
                    self.bridge.new_game();
                }
                Effect::FallBackEngine => {
                    if !self.bridge.is_falling_back() {
                        self.messages.push(
                            "the engine is not answering; the opponent will play random moves"
                                .to_string(),
                        );
                    }
                    self.bridge.fall_back();
                }
                Effect::Schedule { delay, wake } => self.scheduled.push((now + delay, wake)),
                Effect::BoardChanged => self.redraw = true,
                Effect::Cue(cue) => {
                    debug!(?cue, "cue");
                    if cue == Cue::Illegal {
                        self.messages.push("illegal move".to_string());
                    }
                }
                Effect::Remark(remark) => {
                    let line = remark.pick(&mut self.rng);
                    self.messages
                        .push(format!("{}: {}", self.game.opponent().name, line));
                }
            }
        }
    }
}

/// Run a session on stdin/stdout until the user quits or input ends
pub fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir();
    info!(dir = %data_dir.display(), "using data directory");
    let mut persistence = PersistenceGateway::new(FileStore::new(data_dir));

    let saved = persistence.load();
    let difficulty = cli
        .difficulty
        .or(saved.as_ref().map(|snapshot| snapshot.difficulty))
        .unwrap_or_default();
    let config = SessionConfig {
        difficulty,
        opponent: cli.opponent.clone().or_else(|| persistence.load_opponent()),
        ..SessionConfig::default()
    };

    let mut game = GameModel::new(config);
    if let Some(snapshot) = saved {
        if snapshot.difficulty != difficulty {
            info!(saved = %snapshot.difficulty, %difficulty, "difficulty changed, starting over");
            persistence.discard_game();
        } else if let Err(e) = game.restore(&snapshot) {
            warn!(error = %e, "discarding saved game");
            persistence.discard_game();
        }
    }

    let engine: Box<dyn Engine> = match UciEngine::spawn(&cli.engine) {
        Ok(engine) => Box::new(engine),
        Err(e) => {
            warn!(error = %e, "falling back to random moves");
            println!("{e}; the opponent will play random moves");
            Box::new(RandomEngine::new())
        }
    };

    let mut driver = Driver::new(game, engine, persistence);
    driver.start(Instant::now());
    if let Some(name) = cli.opponent.clone() {
        driver.handle(Command::Opponent(name), Instant::now());
    }

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("type `help` for commands");
    loop {
        match rx.recv_timeout(cli.tick()) {
            Ok(line) => match line.parse::<Command>() {
                Ok(command) => {
                    if !driver.handle(command, Instant::now()) {
                        break;
                    }
                }
                Err(e) => println!("{e}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        driver.pump(Instant::now());
        for message in driver.take_messages() {
            println!("{message}");
        }
        if driver.take_redraw() {
            print!("{}", render(&BoardView::of(driver.game())));
        }
    }

    driver.persist();
    info!("session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::START_FEN;
    use crate::models::engine::{RequestKind, ScriptedEngine};
    use crate::models::persistence::MemoryStore;
    use std::time::Duration;

    type TestDriver = Driver<ScriptedEngine, MemoryStore>;

    fn driver() -> TestDriver {
        Driver::new(
            GameModel::new(SessionConfig::default()),
            ScriptedEngine::new(),
            PersistenceGateway::new(MemoryStore::new()),
        )
    }

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("e2e4".parse::<Command>().unwrap(), Command::Move(mv("e2e4")));
        assert_eq!(
            "move e7e8q".parse::<Command>().unwrap(),
            Command::Move(mv("e7e8q"))
        );
        assert_eq!("e2".parse::<Command>().unwrap(), Command::Click(Square::E2));
        assert_eq!(
            "promote n".parse::<Command>().unwrap(),
            Command::Promote(PieceKind::Knight)
        );
        assert_eq!(
            "color black".parse::<Command>().unwrap(),
            Command::Color(Side::Black)
        );
        assert_eq!(
            "opponent Endgame Eli".parse::<Command>().unwrap(),
            Command::Opponent("Endgame Eli".to_string())
        );
        assert_eq!("  QUIT ".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_command_errors() {
        assert!(matches!(
            "fly".parse::<Command>(),
            Err(CommandError::Unknown(_))
        ));
        assert!(matches!(
            "click".parse::<Command>(),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            "promote x".parse::<Command>(),
            Err(CommandError::Chess(_))
        ));
        assert!("color green".parse::<Command>().is_err());
    }

    #[test]
    fn test_user_move_reaches_engine_and_back() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        assert!(driver.take_redraw());

        assert!(driver.handle(Command::Move(mv("e2e4")), t0));
        assert!(driver.bridge().has_pending_move());
        let (_, job) = driver.bridge().engine().searches.last().unwrap();
        assert_ne!(job.fen, START_FEN);
        assert!(driver.persistence().store().get("game-state").unwrap().is_some());

        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Move, mv("e7e5"));
        driver.pump(t0 + Duration::from_millis(100));

        assert_eq!(driver.game().session().history().len(), 3);
        assert!(!driver.game().is_engine_thinking());
        let messages = driver.take_messages();
        assert!(messages.iter().any(|m| m.starts_with(&driver.game().opponent().name)));
    }

    #[test]
    fn test_illegal_move_reports_message() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Move(mv("e2e5")), t0);
        assert_eq!(driver.take_messages(), vec!["illegal move".to_string()]);
        assert!(!driver.bridge().has_pending_move());
    }

    #[test]
    fn test_restart_ignores_late_engine_reply() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Move(mv("e2e4")), t0);
        let (old_ticket, _) = *driver.bridge().engine().searches.last().unwrap();

        driver.handle(Command::Restart, t0);
        assert!(driver.bridge().engine().cancelled.contains(&old_ticket));
        assert_eq!(driver.bridge().engine().new_games, 1);

        driver
            .bridge_mut()
            .engine_mut()
            .answer(old_ticket, Some(mv("e7e5")));
        driver.pump(t0 + Duration::from_millis(50));
        assert_eq!(driver.game().session().history().len(), 1);
        assert_eq!(driver.game().session().position().fen(), START_FEN);
    }

    #[test]
    fn test_black_player_engine_opens_after_delay() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Color(Side::Black), t0);
        assert!(!driver.bridge().has_pending_move());
        let due = driver.next_wake().unwrap();
        assert_eq!(due, t0 + SessionConfig::default().opening_engine_delay);

        driver.pump(due - Duration::from_millis(1));
        assert!(!driver.bridge().has_pending_move());
        driver.pump(due);
        assert!(driver.bridge().has_pending_move());
        assert!(driver.next_wake().is_none());
    }

    #[test]
    fn test_premove_played_after_engine_reply() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Move(mv("e2e4")), t0);
        driver.handle(Command::Move(mv("g1f3")), t0);
        assert!(driver.game().premoves().queued().is_some());

        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Move, mv("e7e5"));
        driver.pump(t0);
        let due = driver.next_wake().unwrap();
        driver.pump(due);

        assert_eq!(driver.game().session().history().len(), 4);
        assert!(driver.game().premoves().queued().is_none());
        assert!(driver.bridge().has_pending_move());
    }

    #[test]
    fn test_hint_delivered_on_users_turn() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Move(mv("d2d4")), t0);
        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Move, mv("d7d5"));
        driver.pump(t0);

        driver.handle(Command::Hint, t0);
        assert!(driver.bridge().has_pending_hint());
        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Hint, mv("c2c4"));
        driver.pump(t0);
        assert_eq!(driver.game().hint(), Some(mv("c2c4")));
    }

    #[test]
    fn test_failed_engine_request_is_retried() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.bridge_mut().engine_mut().fail_searches = true;
        driver.handle(Command::Move(mv("e2e4")), t0);
        let messages = driver.take_messages();
        assert!(messages.iter().any(|m| m.starts_with("engine unavailable")));
        assert!(!driver.bridge().has_pending_move());
        assert!(driver.game().is_engine_thinking());
        let due = driver.next_wake().unwrap();
        assert_eq!(due, t0 + SessionConfig::default().engine_retry_delay);

        driver.bridge_mut().engine_mut().fail_searches = false;
        driver.pump(due);
        assert!(driver.bridge().has_pending_move());
        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Move, mv("e7e5"));
        driver.pump(due);
        assert_eq!(driver.game().session().history().len(), 3);
        assert!(driver.game().is_users_turn());
    }

    #[test]
    fn test_dead_engine_falls_back_to_random_moves() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.bridge_mut().engine_mut().fail_searches = true;
        driver.handle(Command::Move(mv("e2e4")), t0);

        let mut now = t0;
        while let Some(due) = driver.next_wake() {
            now = due;
            driver.pump(now);
        }
        assert!(driver.bridge().is_falling_back());
        assert!(
            driver
                .take_messages()
                .iter()
                .any(|m| m.contains("random moves"))
        );

        driver.pump(now);
        assert_eq!(driver.game().session().history().len(), 3);
        assert!(driver.game().is_users_turn());
        assert!(!driver.game().is_engine_thinking());
        assert!(driver.bridge().engine().searches.is_empty());
    }

    #[test]
    fn test_engine_reply_without_move_is_retried() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Move(mv("e2e4")), t0);
        let (ticket, _) = *driver.bridge().engine().searches.last().unwrap();

        driver.bridge_mut().engine_mut().answer(ticket, None);
        driver.pump(t0);
        assert!(!driver.bridge().has_pending_move());
        assert!(driver.game().is_engine_thinking());

        let due = driver.next_wake().unwrap();
        driver.pump(due);
        assert_eq!(driver.bridge().engine().searches.len(), 2);
        assert!(driver.bridge().has_pending_move());
    }

    #[test]
    fn test_illegal_engine_reply_is_retried() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Move(mv("e2e4")), t0);
        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Move, mv("e2e4"));
        driver.pump(t0);
        assert_eq!(driver.game().session().history().len(), 2);
        assert!(!driver.game().is_users_turn());

        let due = driver.next_wake().unwrap();
        driver.pump(due);
        assert_eq!(driver.bridge().engine().searches.len(), 2);
        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Move, mv("e7e5"));
        driver.pump(due);
        assert_eq!(driver.game().session().history().len(), 3);
    }

    #[test]
    fn test_hint_without_move_is_reported() {
        let t0 = Instant::now();
        let mut driver = driver();
        driver.start(t0);
        driver.handle(Command::Move(mv("d2d4")), t0);
        driver
            .bridge_mut()
            .engine_mut()
            .answer_latest(RequestKind::Move, mv("d7d5"));
        driver.pump(t0);

        driver.handle(Command::Hint, t0);
        let (ticket, _) = *driver.bridge().engine().searches.last().unwrap();
        driver.bridge_mut().engine_mut().answer(ticket, None);
        driver.take_messages();
        driver.pump(t0);
        assert_eq!(driver.take_messages(), vec!["no hint available".to_string()]);
        assert_eq!(driver.game().hint(), None);
    }

    #[test]
    fn test_quit_and_help() {
        let mut driver = driver();
        assert!(driver.handle(Command::Help, Instant::now()));
        assert_eq!(driver.take_messages().len(), 1);
        assert!(!driver.handle(Command::Quit, Instant::now()));
    }
}
