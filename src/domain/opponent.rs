//! Difficulty tiers and the opponents available in each.
//!
//! The session treats an opponent as opaque configuration: its strength
//! profile is passed through to the engine untouched.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ChessError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Easy,
    #[default]
    Intermediate,
    Advanced,
    Hard,
    Expert,
    Master,
    Grandmaster,
}

impl Difficulty {
    pub const ALL: [Difficulty; 8] = [
        Difficulty::Beginner,
        Difficulty::Easy,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Hard,
        Difficulty::Expert,
        Difficulty::Master,
        Difficulty::Grandmaster,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Easy => "easy",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
            Difficulty::Master => "master",
            Difficulty::Grandmaster => "grandmaster",
        }
    }

    fn tier(self) -> u32 {
        self as u32
    }

    /// Built-in opponents for this tier, weakest first
    pub fn roster(self) -> Vec<OpponentProfile> {
        let names: [&str; 2] = match self {
            Difficulty::Beginner => ["Pip", "Clover"],
            Difficulty::Easy => ["Rook Rookie", "Bishop Bea"],
            Difficulty::Intermediate => ["Knightly", "Gambit Gus"],
            Difficulty::Advanced => ["Fianchetto", "Zugzwang Zoe"],
            Difficulty::Hard => ["Sicilian Sam", "Endgame Eli"],
            Difficulty::Expert => ["Tactician", "Positional Paz"],
            Difficulty::Master => ["Master Mira", "Master Orin"],
            Difficulty::Grandmaster => ["Grandmaster Vex", "Grandmaster Ilse"],
        };
        let tier = self.tier();
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let step = tier * 2 + i as u32;
                OpponentProfile {
                    name: name.to_string(),
                    rating: 400 + step * 150,
                    strength: StrengthProfile {
                        skill_level: (step * 20 / 15).min(20) as u8,
                        depth: 1 + step,
                        move_time_ms: 200 + u64::from(step) * 100,
                    },
                }
            })
            .collect()
    }

    /// The saved opponent when it belongs to this tier, otherwise the
    /// tier's first opponent.
    pub fn resolve_opponent(self, saved: Option<&str>) -> OpponentProfile {
        let roster = self.roster();
        saved
            .and_then(|name| roster.iter().find(|p| p.name == name).cloned())
            .unwrap_or_else(|| roster[0].clone())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| ChessError::UnknownDifficulty(s.to_string()))
    }
}

/// Engine limits for one opponent
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, JsonSchema)]
pub struct StrengthProfile {
    /// UCI "Skill Level", 0..=20
    pub skill_level: u8,
    /// Maximum search depth in plies
    pub depth: u32,
    /// Time budget per move
    pub move_time_ms: u64,
}

/// A selectable opponent
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, JsonSchema)]
pub struct OpponentProfile {
    pub name: String,
    pub rating: u32,
    pub strength: StrengthProfile,
}
