//! Linear, cursor-addressable record of the positions of a game.
//!
//! Unlike a variation tree, a new move made after stepping back truncates
//! the abandoned continuation, so `len() == cursor()` after every append.

use crate::domain::chess::Move;
use crate::domain::position::Position;
use crate::error::SessionError;

/// A position together with the move that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub position: Position,
    /// None for the starting entry
    pub last_move: Option<Move>,
    /// SAN of `last_move`, for move lists
    pub san: Option<String>,
}

impl HistoryEntry {
    /// Entry for a starting position
    pub fn root(position: Position) -> Self {
        Self {
            position,
            last_move: None,
            san: None,
        }
    }

    pub fn new(position: Position, last_move: Move, san: String) -> Self {
        Self {
            position,
            last_move: Some(last_move),
            san: Some(san),
        }
    }
}

/// Ordered positions with a 1-based cursor
#[derive(Clone, Debug)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
    /// 1-based index of the viewed entry
    cursor: usize,
}

impl HistoryLedger {
    /// A ledger holding only `start`
    pub fn new(start: Position) -> Self {
        Self {
            entries: vec![HistoryEntry::root(start)],
            cursor: 1,
        }
    }

    /// Rebuild a ledger from stored parts
    pub fn from_parts(entries: Vec<HistoryEntry>, cursor: usize) -> Result<Self, SessionError> {
        if entries.is_empty() {
            return Err(SessionError::EmptyHistory);
        }
        if cursor == 0 || cursor > entries.len() {
            return Err(SessionError::Cursor {
                cursor,
                len: entries.len(),
            });
        }
        Ok(Self { entries, cursor })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: a ledger always holds its starting entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry under the cursor
    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.cursor - 1]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Whether the cursor is on the newest entry
    pub fn is_at_end(&self) -> bool {
        self.cursor == self.entries.len()
    }

    /// Append after the cursor, discarding anything beyond it
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.cursor);
        self.entries.push(entry);
        self.cursor = self.entries.len();
    }

    /// Step back one entry. No-op at the start.
    pub fn move_back(&mut self) -> Option<&HistoryEntry> {
        if self.cursor <= 1 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Step forward one entry. No-op at the end.
    pub fn move_forward(&mut self) -> Option<&HistoryEntry> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    /// How many entries up to and including the cursor share `key`
    pub fn repetitions_of(&self, key: &str) -> usize {
        self.entries[..self.cursor]
            .iter()
            .filter(|entry| entry.position.repetition_key() == key)
            .count()
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(Position::start())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::oracle::{RulesOracle, StandardRules};

    fn play(ledger: &mut HistoryLedger, uci: &str) {
        let mv: Move = uci.parse().unwrap();
        let result = StandardRules
            .try_move(&ledger.current().position, &mv)
            .unwrap();
        ledger.append(HistoryEntry::new(result.position, result.played, result.san));
    }

    #[test]
    fn test_new_ledger() {
        let ledger = HistoryLedger::default();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.cursor(), 1);
        assert!(ledger.is_at_end());
        assert!(!ledger.is_empty());
    }

    #[test]
    fn test_append_advances_cursor() {
        let mut ledger = HistoryLedger::default();
        play(&mut ledger, "e2e4");
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.cursor(), 2);
        assert_eq!(ledger.current().san.as_deref(), Some("e4"));
    }

    #[test]
    fn test_navigation_bounds() {
        let mut ledger = HistoryLedger::default();
        assert!(ledger.move_back().is_none());
        assert!(ledger.move_forward().is_none());

        play(&mut ledger, "e2e4");
        play(&mut ledger, "e7e5");
        assert!(ledger.move_forward().is_none());
        assert_eq!(ledger.cursor(), 3);

        let back = ledger.move_back().unwrap();
        assert_eq!(back.san.as_deref(), Some("e4"));
        assert_eq!(ledger.cursor(), 2);

        ledger.move_back();
        assert!(ledger.move_back().is_none());
        assert_eq!(ledger.cursor(), 1);

        assert!(ledger.move_forward().is_some());
        assert_eq!(ledger.cursor(), 2);
    }

    #[test]
    fn test_append_after_back_step_truncates() {
        let mut ledger = HistoryLedger::default();
        play(&mut ledger, "e2e4");
        play(&mut ledger, "e7e5");
        play(&mut ledger, "g1f3");
        ledger.move_back();
        ledger.move_back();
        assert_eq!(ledger.cursor(), 2);

        play(&mut ledger, "c7c5");
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.cursor(), 3);
        assert!(ledger.move_forward().is_none());
        assert_eq!(ledger.current().san.as_deref(), Some("c5"));
    }

    #[test]
    fn test_from_parts_validates_cursor() {
        let entries = vec![HistoryEntry::root(Position::start())];
        assert!(HistoryLedger::from_parts(entries.clone(), 1).is_ok());
        assert!(matches!(
            HistoryLedger::from_parts(entries.clone(), 2),
            Err(SessionError::Cursor { cursor: 2, len: 1 })
        ));
        assert!(HistoryLedger::from_parts(entries, 0).is_err());
        assert!(matches!(
            HistoryLedger::from_parts(Vec::new(), 1),
            Err(SessionError::EmptyHistory)
        ));
    }

    #[test]
    fn test_repetitions() {
        let mut ledger = HistoryLedger::default();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            play(&mut ledger, uci);
        }
        let key = ledger.current().position.repetition_key().to_string();
        assert_eq!(ledger.repetitions_of(&key), 2);
    }
}
