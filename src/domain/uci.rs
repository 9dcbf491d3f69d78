//! UCI (Universal Chess Interface) protocol types and utilities.
//!
//! This module handles the wire format spoken to an engine process.
//! It does not spawn anything (that's done in the models layer).

use crate::domain::chess::Move;
use crate::domain::opponent::StrengthProfile;

/// UCI commands that can be sent to an engine
#[derive(Debug, Clone, PartialEq)]
pub enum UciCommand {
    /// Initialize UCI mode
    Uci,
    /// Check if engine is ready
    IsReady,
    /// Forget everything about the previous game
    UciNewGame,
    /// Set an engine option
    SetOption { name: String, value: String },
    /// Set position (startpos or FEN, with optional moves)
    Position { fen: Option<String>, moves: Vec<String> },
    /// Search with optional depth and time limits
    Go {
        depth: Option<u32>,
        movetime_ms: Option<u64>,
    },
    /// Stop the running search; the engine still answers with `bestmove`
    Stop,
    /// Quit the engine
    Quit,
}

impl UciCommand {
    /// Commands that configure and start a search for `fen` at `strength`
    pub fn search(fen: &str, strength: &StrengthProfile) -> Vec<UciCommand> {
        vec![
            UciCommand::SetOption {
                name: "Skill Level".to_string(),
                value: strength.skill_level.to_string(),
            },
            UciCommand::Position {
                fen: Some(fen.to_string()),
                moves: vec![],
            },
            UciCommand::Go {
                depth: Some(strength.depth),
                movetime_ms: Some(strength.move_time_ms),
            },
        ]
    }

    /// Convert command to UCI protocol string
    pub fn to_uci_string(&self) -> String {
        match self {
            UciCommand::Uci => "uci".to_string(),
            UciCommand::IsReady => "isready".to_string(),
            UciCommand::UciNewGame => "ucinewgame".to_string(),
            UciCommand::SetOption { name, value } => {
                format!("setoption name {} value {}", name, value)
            }
            UciCommand::Position { fen, moves } => {
                let mut cmd = String::from("position ");
                match fen {
                    Some(f) => {
                        cmd.push_str("fen ");
                        cmd.push_str(f);
                    }
                    None => cmd.push_str("startpos"),
                }
                if !moves.is_empty() {
                    cmd.push_str(" moves ");
                    cmd.push_str(&moves.join(" "));
                }
                cmd
            }
            UciCommand::Go { depth, movetime_ms } => {
                let mut cmd = String::from("go");
                if let Some(d) = depth {
                    cmd.push_str(&format!(" depth {}", d));
                }
                if let Some(t) = movetime_ms {
                    cmd.push_str(&format!(" movetime {}", t));
                }
                cmd
            }
            UciCommand::Stop => "stop".to_string(),
            UciCommand::Quit => "quit".to_string(),
        }
    }
}

/// Categorized engine output line
#[derive(Debug, Clone, PartialEq)]
pub enum UciOutputKind {
    /// "uciok" - engine is ready for UCI
    UciOk,
    /// "readyok" - engine is ready
    ReadyOk,
    /// "info ..." - analysis information
    Info(String),
    /// "bestmove ..." - the search finished. None for "bestmove (none)"
    /// or an unparsable move.
    BestMove(Option<Move>),
    /// Engine identification
    Id(String),
    /// Unknown/other output
    Other(String),
}

impl UciOutputKind {
    /// Parse a raw UCI output line into a categorized type
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if line == "uciok" {
            UciOutputKind::UciOk
        } else if line == "readyok" {
            UciOutputKind::ReadyOk
        } else if let Some(rest) = line.strip_prefix("info ") {
            UciOutputKind::Info(rest.to_string())
        } else if let Some(rest) = line.strip_prefix("bestmove") {
            let best = rest
                .split_whitespace()
                .next()
                .and_then(|token| token.parse::<Move>().ok());
            UciOutputKind::BestMove(best)
        } else if let Some(rest) = line.strip_prefix("id ") {
            UciOutputKind::Id(rest.to_string())
        } else {
            UciOutputKind::Other(line.to_string())
        }
    }
}
