//! Command-line surface and session tuning.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use directories::ProjectDirs;

use crate::domain::{Difficulty, StrengthProfile};
use crate::models::timer::TimerSnapshot;

/// Directory used when the platform has no per-user data directory
const FALLBACK_DATA_DIR: &str = ".chess-session";

/// Play chess against a UCI engine from the terminal
#[derive(Parser, Debug, Clone)]
#[command(name = "chess-session", version)]
pub struct Cli {
    /// UCI engine executable
    #[arg(long, default_value = "stockfish")]
    pub engine: String,

    /// Where the saved game and opponent selection are stored
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Difficulty tier. A saved game at another tier is discarded.
    #[arg(long)]
    pub difficulty: Option<Difficulty>,

    /// Opponent name within the difficulty tier
    #[arg(long)]
    pub opponent: Option<String>,

    /// Poll interval for engine replies, timers and clocks, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub tick_ms: u64,

    /// Print the JSON schema of the saved game and exit
    #[arg(long)]
    pub print_schema: bool,
}

impl Cli {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Per-user data directory, or a local fallback
pub fn default_data_dir() -> PathBuf {
    match ProjectDirs::from("org", "chess-session", "chess-session") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from(FALLBACK_DATA_DIR),
    }
}

/// Timing and defaults for a game session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Wait before a queued pre-move is played, so the board settles first
    pub premove_delay: Duration,
    /// Wait before the engine answers a promotion, so it is saved first
    pub promotion_engine_delay: Duration,
    /// Wait before the engine opens the game when the user plays black
    pub opening_engine_delay: Duration,
    /// Wait before asking again after the engine failed to deliver a move
    pub engine_retry_delay: Duration,
    /// Failed move requests tolerated in a row before random moves take over
    pub engine_retries: u32,
    /// Engine limits for hints
    pub hint_strength: StrengthProfile,
    /// Clock values after a reset
    pub timer_defaults: TimerSnapshot,
    pub difficulty: Difficulty,
    /// Preferred opponent name, if any
    pub opponent: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            premove_delay: Duration::from_millis(300),
            promotion_engine_delay: Duration::from_millis(1000),
            opening_engine_delay: Duration::from_millis(500),
            engine_retry_delay: Duration::from_millis(1000),
            engine_retries: 2,
            hint_strength: StrengthProfile {
                skill_level: 20,
                depth: 12,
                move_time_ms: 1000,
            },
            timer_defaults: TimerSnapshot::default(),
            difficulty: Difficulty::default(),
            opponent: None,
        }
    }
}
