//! Engine collaborators - anything that can answer "what would you play here".
//!
//! Requests are tagged with a [`Ticket`] and answered later through
//! [`Engine::poll`]; nothing here blocks the caller.
//!
//! Architecture:
//! - [`UciEngine`] runs an external UCI process with I/O on OS threads
//!   (reader/writer), and the owner drains the event channel on each poll
//! - [`RandomEngine`] answers with a random legal move, for when no engine
//!   binary is available

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rand::seq::IndexedRandom;
use shakmaty::Square;
use tracing::{debug, info, trace, warn};

use crate::domain::uci::{UciCommand, UciOutputKind};
use crate::domain::{Move, Position, RulesOracle, StandardRules, StrengthProfile};
use crate::error::EngineError;

/// What a request is for
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RequestKind {
    Move,
    Hint,
}

/// Identifies one request. Generations only ever grow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Ticket {
    pub kind: RequestKind,
    pub generation: u64,
}

/// A position to search and the limits to search it with
#[derive(Clone, Debug, PartialEq)]
pub struct SearchJob {
    pub fen: String,
    pub strength: StrengthProfile,
}

/// Answer to a request. `best_move` is None when the side to move has no
/// move or the engine went away before answering.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineReply {
    pub ticket: Ticket,
    pub best_move: Option<Move>,
}

pub trait Engine {
    /// Start (or queue) a search answered later under `ticket`
    fn search(&mut self, ticket: Ticket, job: SearchJob) -> Result<(), EngineError>;

    /// Abandon a request. Its reply may still arrive and must be ignored.
    fn cancel(&mut self, ticket: Ticket);

    /// Forget anything learned about the previous game
    fn new_game(&mut self) {}

    /// Replies that arrived since the last poll
    fn poll(&mut self) -> Vec<EngineReply>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn search(&mut self, ticket: Ticket, job: SearchJob) -> Result<(), EngineError> {
        (**self).search(ticket, job)
    }

    fn cancel(&mut self, ticket: Ticket) {
        (**self).cancel(ticket)
    }

    fn new_game(&mut self) {
        (**self).new_game()
    }

    fn poll(&mut self) -> Vec<EngineReply> {
        (**self).poll()
    }
}

/// Messages sent from the engine reader thread to the owner
#[derive(Debug)]
pub enum EngineEvent {
    /// A line of output from the engine
    Output(String),
    /// Engine process exited
    Exited,
    /// Error occurred
    Error(String),
}

/// A UCI engine process. It searches one position at a time; further
/// requests wait in a queue until the running search reports `bestmove`.
pub struct UciEngine {
    running: bool,
    /// Request the running search answers
    active: Option<Ticket>,
    /// `stop` was sent for the active search, so its answer is swallowed
    stopping: bool,
    queue: VecDeque<(Ticket, SearchJob)>,
    /// Channel receiver for engine events (drained by `poll`)
    event_receiver: Receiver<EngineEvent>,
    /// Channel sender for commands to engine writer thread
    command_sender: Option<Sender<String>>,
    /// Handle to the engine process
    process: Option<Child>,
}

impl UciEngine {
    /// Start the engine process at `path` and begin the UCI handshake
    pub fn spawn(path: &str) -> Result<Self, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(EngineError::Pipe("stdout"))?;

        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>();
        let (cmd_tx, cmd_rx) = mpsc::channel::<String>();

        // Reader thread (blocking I/O)
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(text) => {
                        if event_tx.send(EngineEvent::Output(text)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            let _ = event_tx.send(EngineEvent::Exited);
        });

        // Writer thread (blocking I/O)
        thread::spawn(move || {
            let mut writer = stdin;
            while let Ok(cmd) = cmd_rx.recv() {
                if writeln!(writer, "{}", cmd).is_err() {
                    break;
                }
                if writer.flush().is_err() {
                    break;
                }
            }
        });

        let engine = Self {
            running: true,
            active: None,
            stopping: false,
            queue: VecDeque::new(),
            event_receiver: event_rx,
            command_sender: Some(cmd_tx),
            process: Some(child),
        };
        engine.send_command(UciCommand::Uci);
        engine.send_command(UciCommand::IsReady);
        info!(path, "engine started");
        Ok(engine)
    }

    /// Kick off the next queued search if the engine is idle
    fn start_next(&mut self) {
        if self.active.is_some() {
            return;
        }
        if let Some((ticket, job)) = self.queue.pop_front() {
            for cmd in UciCommand::search(&job.fen, &job.strength) {
                self.send_command(cmd);
            }
            self.active = Some(ticket);
        }
    }

    fn handle_line(&mut self, line: &str, replies: &mut Vec<EngineReply>) {
        match UciOutputKind::parse(line) {
            UciOutputKind::BestMove(best_move) => {
                let Some(ticket) = self.active.take() else {
                    debug!(line, "bestmove without a running search");
                    return;
                };
                if std::mem::take(&mut self.stopping) {
                    debug!(?ticket, "swallowing answer of stopped search");
                } else {
                    replies.push(EngineReply { ticket, best_move });
                }
                self.start_next();
            }
            UciOutputKind::Id(id) => debug!(id, "engine identified"),
            _ => trace!(line, "engine output"),
        }
    }

    /// Answer every request still owed with no move
    fn abandon_all(&mut self, replies: &mut Vec<EngineReply>) {
        let stopped = std::mem::take(&mut self.stopping);
        if let Some(ticket) = self.active.take().filter(|_| !stopped) {
            replies.push(EngineReply {
                ticket,
                best_move: None,
            });
        }
        replies.extend(self.queue.drain(..).map(|(ticket, _)| EngineReply {
            ticket,
            best_move: None,
        }));
    }

    /// Quit and reap the process
    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.send_command(UciCommand::Quit);
        self.command_sender = None;
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.running = false;
        self.active = None;
        self.queue.clear();
    }

    fn send_command(&self, cmd: UciCommand) {
        let line = cmd.to_uci_string();
        trace!(%line, "to engine");
        if let Some(tx) = &self.command_sender {
            let _ = tx.send(line);
        }
    }
}

impl Engine for UciEngine {
    fn search(&mut self, ticket: Ticket, job: SearchJob) -> Result<(), EngineError> {
        if !self.running {
            return Err(EngineError::NotRunning);
        }
        self.queue.push_back((ticket, job));
        self.start_next();
        Ok(())
    }

    fn cancel(&mut self, ticket: Ticket) {
        self.queue.retain(|(queued, _)| *queued != ticket);
        if self.active == Some(ticket) && !self.stopping {
            self.send_command(UciCommand::Stop);
            self.stopping = true;
        }
    }

    fn new_game(&mut self) {
        if self.running {
            self.send_command(UciCommand::UciNewGame);
            self.send_command(UciCommand::IsReady);
        }
    }

    fn poll(&mut self) -> Vec<EngineReply> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_receiver.try_recv() {
            events.push(event);
        }

        let mut replies = Vec::new();
        for event in events {
            match event {
                EngineEvent::Output(line) => self.handle_line(&line, &mut replies),
                EngineEvent::Exited => {
                    if self.running {
                        warn!("engine process exited");
                    }
                    self.running = false;
                    self.abandon_all(&mut replies);
                }
                EngineEvent::Error(e) => warn!(error = %e, "engine read failed"),
            }
        }
        replies
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Plays a uniformly random legal move and answers on the next poll
#[derive(Debug, Default)]
pub struct RandomEngine {
    rules: StandardRules,
    ready: Vec<EngineReply>,
}

impl RandomEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn legal_moves(&self, position: &Position) -> Vec<Move> {
        let turn = self.rules.turn_of(position);
        Square::ALL
            .into_iter()
            .filter(|sq| matches!(self.rules.piece_at(position, *sq), Some((side, _)) if side == turn))
            .flat_map(|from| {
                self.rules
                    .legal_targets(position, from)
                    .into_iter()
                    .map(move |to| Move::new(from, to))
            })
            .collect()
    }
}

impl Engine for RandomEngine {
    fn search(&mut self, ticket: Ticket, job: SearchJob) -> Result<(), EngineError> {
        let best_move = match Position::from_fen(&job.fen) {
            Ok(position) => self.legal_moves(&position).choose(&mut rand::rng()).copied(),
            Err(e) => {
                warn!(error = %e, "random engine got an unreadable position");
                None
            }
        };
        self.ready.push(EngineReply { ticket, best_move });
        Ok(())
    }

    fn cancel(&mut self, ticket: Ticket) {
        self.ready.retain(|reply| reply.ticket != ticket);
    }

    fn poll(&mut self) -> Vec<EngineReply> {
        std::mem::take(&mut self.ready)
    }
}

/// Test double: records requests and answers only when told to
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    pub searches: Vec<(Ticket, SearchJob)>,
    pub cancelled: Vec<Ticket>,
    pub new_games: usize,
    pub fail_searches: bool,
    ready: Vec<EngineReply>,
}

#[cfg(test)]
impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `ticket` on the next poll, whether or not it was cancelled
    pub fn answer(&mut self, ticket: Ticket, best_move: Option<Move>) {
        self.ready.push(EngineReply { ticket, best_move });
    }

    /// Answer the most recent request of `kind`
    pub fn answer_latest(&mut self, kind: RequestKind, best_move: Move) {
        if let Some((ticket, _)) = self.searches.iter().rev().find(|(t, _)| t.kind == kind) {
            let ticket = *ticket;
            self.answer(ticket, Some(best_move));
        }
    }
}

#[cfg(test)]
impl Engine for ScriptedEngine {
    fn search(&mut self, ticket: Ticket, job: SearchJob) -> Result<(), EngineError> {
        if self.fail_searches {
            return Err(EngineError::NotRunning);
        }
        self.searches.push((ticket, job));
        Ok(())
    }

    fn cancel(&mut self, ticket: Ticket) {
        self.cancelled.push(ticket);
    }

    fn new_game(&mut self) {
        self.new_games += 1;
    }

    fn poll(&mut self) -> Vec<EngineReply> {
        std::mem::take(&mut self.ready)
    }
}
