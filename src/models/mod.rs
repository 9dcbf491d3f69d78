//! Session state machines and the collaborators they talk to.

pub mod bridge;
pub mod engine;
pub mod game;
pub mod persistence;
pub mod premove;
pub mod promotion;
pub mod session;
pub mod timer;

pub use bridge::{EngineBridge, Resolution};
pub use engine::{Engine, RandomEngine, UciEngine};
pub use game::{Cue, Effect, GameModel, Wake};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, PersistenceGateway, SessionSnapshot};
pub use session::{GameStatus, MoveOutcome, SessionState};
pub use timer::{TimerService, TimerSnapshot};
