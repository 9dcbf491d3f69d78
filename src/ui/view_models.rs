//! View models for rendering the session.
//!
//! These types are DTOs that prepare game state for display. They live in
//! the UI layer, not the models layer, and are rebuilt after every
//! board-change notification.

use shakmaty::Square;

use crate::domain::{CapturedPiece, Difficulty, Move, OpponentProfile, RulesOracle, Side};
use crate::models::game::GameModel;
use crate::models::premove::PreMove;
use crate::models::promotion::PendingPromotion;
use crate::models::session::GameStatus;
use crate::models::timer::TimerSnapshot;

/// Everything a renderer needs after a board change
#[derive(Clone, Debug)]
pub struct BoardView {
    pub fen: String,
    pub turn: Side,
    /// Colour the user plays; the board is drawn from this side
    pub player: Side,
    pub last_move: Option<Move>,
    pub captured: Vec<CapturedPiece>,
    pub status: GameStatus,
    pub game_over: bool,
    pub game_started: bool,
    pub clocks: TimerSnapshot,
    /// 1-based history cursor
    pub cursor: usize,
    /// SAN of every move in history order
    pub moves: Vec<String>,
    /// Selected square (own turn or pre-move source)
    pub selected: Option<Square>,
    /// Where the selected piece may go
    pub targets: Vec<Square>,
    pub premove: Option<PreMove>,
    pub pending_promotion: Option<PendingPromotion>,
    pub hint: Option<Move>,
    pub engine_thinking: bool,
    pub difficulty: Difficulty,
    pub opponent: OpponentProfile,
}

impl BoardView {
    pub fn of<R: RulesOracle>(game: &GameModel<R>) -> Self {
        let session = game.session();
        let history = session.history();
        let premoves = game.premoves();

        let (selected, targets) = match premoves.selected_source() {
            Some(source) => (Some(source), premoves.possible_targets().to_vec()),
            None => (game.selected_square(), game.selected_targets().to_vec()),
        };

        Self {
            fen: session.position().fen().to_string(),
            turn: session.turn(),
            player: game.player(),
            last_move: session.last_move(),
            captured: session.captured().to_vec(),
            status: session.status(),
            game_over: session.is_over(),
            game_started: session.game_started(),
            clocks: game.timer().snapshot(),
            cursor: history.cursor(),
            moves: history
                .entries()
                .iter()
                .filter_map(|entry| entry.san.clone())
                .collect(),
            selected,
            targets,
            premove: premoves.queued(),
            pending_promotion: game.promotion().pending(),
            hint: game.hint(),
            engine_thinking: game.is_engine_thinking(),
            difficulty: game.difficulty(),
            opponent: game.opponent().clone(),
        }
    }

    /// Whether the viewed position is the newest one
    pub fn is_live(&self) -> bool {
        self.cursor == self.moves.len() + 1
    }
}
