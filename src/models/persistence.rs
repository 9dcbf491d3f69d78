//! Durable session storage.
//!
//! The session is stored as one JSON record per logical key in a
//! string-valued key-value store. Records are plain DTOs so the stored
//! format stays independent of in-memory types.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{CapturedPiece, Difficulty, Move, PieceKind, Side, parse_square};
use crate::error::{ChessError, SessionError, StorageError};
use crate::models::timer::TimerSnapshot;

/// Key of the saved game
pub const GAME_STATE_KEY: &str = "game-state";
/// Key of the selected opponent's name
pub const SELECTED_OPPONENT_KEY: &str = "selected-opponent";
/// Format version written into every [`SessionSnapshot`]
pub const SNAPSHOT_VERSION: u32 = 1;

/// String key-value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a directory
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        // write then rename so a crash never leaves half a record behind
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(io_error(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_error(&path))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }
}

/// In-memory store, nothing survives the process
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

/// A move as stored: square names plus optional promotion piece
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
}

impl From<Move> for MoveRecord {
    fn from(mv: Move) -> Self {
        Self {
            from: mv.from.to_string(),
            to: mv.to.to_string(),
            promotion: mv.promotion,
        }
    }
}

impl TryFrom<&MoveRecord> for Move {
    type Error = ChessError;

    fn try_from(record: &MoveRecord) -> Result<Self, Self::Error> {
        Ok(Move {
            from: parse_square(&record.from)?,
            to: parse_square(&record.to)?,
            promotion: record.promotion,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub fen: String,
    pub last_move: Option<MoveRecord>,
    #[serde(default)]
    pub san: Option<String>,
}

/// Clock durations in milliseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClockRecord {
    pub total_ms: u64,
    pub white_ms: u64,
    pub black_ms: u64,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl From<TimerSnapshot> for ClockRecord {
    fn from(snapshot: TimerSnapshot) -> Self {
        Self {
            total_ms: millis(snapshot.total),
            white_ms: millis(snapshot.white),
            black_ms: millis(snapshot.black),
        }
    }
}

impl From<ClockRecord> for TimerSnapshot {
    fn from(record: ClockRecord) -> Self {
        Self {
            total: Duration::from_millis(record.total_ms),
            white: Duration::from_millis(record.white_ms),
            black: Duration::from_millis(record.black_ms),
        }
    }
}

/// Everything needed to resume a session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub version: u32,
    /// Live position
    pub fen: String,
    pub player_color: Side,
    pub difficulty: Difficulty,
    /// Opponent profile name
    pub opponent: Option<String>,
    pub game_started: bool,
    pub history: Vec<HistoryRecord>,
    /// 1-based history cursor
    pub current_move: usize,
    pub last_move: Option<MoveRecord>,
    pub captured_pieces: Vec<CapturedPiece>,
    pub clocks: ClockRecord,
    /// Side that resigned, if any
    #[serde(default)]
    pub resigned: Option<Side>,
}

impl SessionSnapshot {
    pub fn check_version(&self) -> Result<(), SessionError> {
        if self.version == SNAPSHOT_VERSION {
            Ok(())
        } else {
            Err(SessionError::Version {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            })
        }
    }
}

/// Typed access to the session's keys
pub struct PersistenceGateway<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> PersistenceGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save(&mut self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let json = serde_json::to_string(snapshot)?;
        self.store.set(GAME_STATE_KEY, &json)
    }

    /// The saved game. Missing, unreadable, malformed or outdated records
    /// all come back as None; broken ones are removed.
    pub fn load(&mut self) -> Option<SessionSnapshot> {
        let text = match self.store.get(GAME_STATE_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "could not read saved game");
                return None;
            }
        };

        let snapshot = match serde_json::from_str::<SessionSnapshot>(&text) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "discarding malformed saved game");
                self.discard_game();
                return None;
            }
        };
        if let Err(e) = snapshot.check_version() {
            warn!(error = %e, "discarding saved game");
            self.discard_game();
            return None;
        }
        Some(snapshot)
    }

    pub fn clear_game(&mut self) -> Result<(), StorageError> {
        self.store.remove(GAME_STATE_KEY)
    }

    /// Remove the saved game, logging instead of failing
    pub fn discard_game(&mut self) {
        if let Err(e) = self.clear_game() {
            warn!(error = %e, "could not remove saved game");
        }
    }

    pub fn save_opponent(&mut self, name: &str) -> Result<(), StorageError> {
        let json = serde_json::to_string(name)?;
        self.store.set(SELECTED_OPPONENT_KEY, &json)
    }

    pub fn load_opponent(&self) -> Option<String> {
        match self.store.get(SELECTED_OPPONENT_KEY) {
            Ok(Some(text)) => serde_json::from_str(&text)
                .inspect_err(|e| warn!(error = %e, "ignoring malformed selected opponent"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "could not read selected opponent");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::START_FEN;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            fen: START_FEN.to_string(),
            player_color: Side::White,
            difficulty: Difficulty::Easy,
            opponent: Some("Bishop Bea".to_string()),
            game_started: false,
            history: vec![HistoryRecord {
                fen: START_FEN.to_string(),
                last_move: None,
                san: None,
            }],
            current_move: 1,
            last_move: None,
            captured_pieces: Vec::new(),
            clocks: ClockRecord::default(),
            resigned: None,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "chess-session-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_and_load() {
        let mut gateway = PersistenceGateway::new(MemoryStore::new());
        assert!(gateway.load().is_none());
        gateway.save(&snapshot()).unwrap();
        assert_eq!(gateway.load(), Some(snapshot()));
    }

    #[test]
    fn test_malformed_record_is_discarded() {
        let mut store = MemoryStore::new();
        store.set(GAME_STATE_KEY, "{not json").unwrap();
        let mut gateway = PersistenceGateway::new(store);
        assert!(gateway.load().is_none());
        assert_eq!(gateway.store().get(GAME_STATE_KEY).unwrap(), None);
    }

    #[test]
    fn test_other_version_is_discarded() {
        let mut gateway = PersistenceGateway::new(MemoryStore::new());
        let mut old = snapshot();
        old.version = 0;
        gateway.save(&old).unwrap();
        assert!(gateway.load().is_none());
    }

    #[test]
    fn test_snapshot_field_names() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(json["playerColor"], "w");
        assert_eq!(json["currentMove"], 1);
        assert_eq!(json["difficulty"], "easy");
        assert!(json["clocks"]["totalMs"].is_number());
    }

    #[test]
    fn test_opponent_roundtrip() {
        let mut gateway = PersistenceGateway::new(MemoryStore::new());
        assert_eq!(gateway.load_opponent(), None);
        gateway.save_opponent("Gambit Gus").unwrap();
        assert_eq!(gateway.load_opponent().as_deref(), Some("Gambit Gus"));
    }

    #[test]
    fn test_move_record_conversion() {
        let mv: Move = "a7a8n".parse().unwrap();
        let record = MoveRecord::from(mv);
        assert_eq!(record.from, "a7");
        assert_eq!(Move::try_from(&record).unwrap(), mv);

        let bad = MoveRecord {
            from: "z1".to_string(),
            to: "a2".to_string(),
            promotion: None,
        };
        assert!(Move::try_from(&bad).is_err());
    }

    #[test]
    fn test_file_store() {
        let dir = temp_dir("file-store");
        let mut store = FileStore::new(&dir);
        assert_eq!(store.get("game-state").unwrap(), None);

        store.set("game-state", "{}").unwrap();
        assert!(dir.join("game-state.json").exists());
        assert_eq!(store.get("game-state").unwrap().as_deref(), Some("{}"));

        store.remove("game-state").unwrap();
        store.remove("game-state").unwrap();
        assert_eq!(store.get("game-state").unwrap(), None);

        assert!(matches!(
            store.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_gateway_over_file_store() {
        let dir = temp_dir("gateway");
        let mut gateway = PersistenceGateway::new(FileStore::new(&dir));
        gateway.save(&snapshot()).unwrap();

        let mut reopened = PersistenceGateway::new(FileStore::new(&dir));
        assert_eq!(reopened.load(), Some(snapshot()));
        let _ = fs::remove_dir_all(&dir);
    }
}
