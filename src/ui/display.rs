//! Text rendering of a [`BoardView`].
//!
//! The terminal front end prints these strings; nothing here touches
//! session state.

use std::fmt::Write as _;
use std::time::Duration;

use shakmaty::{File, Rank, Square};

use crate::domain::{DrawReason, PieceKind, Side};
use crate::models::session::GameStatus;
use crate::ui::view_models::BoardView;

/// One-line description of where the game stands
pub fn status_line(status: GameStatus, turn: Side) -> String {
    match status {
        GameStatus::InProgress { check: true } => format!("{} is in check!", turn.name()),
        GameStatus::InProgress { check: false } => format!("{} turn to move", turn.name()),
        GameStatus::Checkmate { winner } => format!("Checkmate! {} wins!", winner.name()),
        GameStatus::Draw(_) => "Game is a draw!".to_string(),
        GameStatus::Resigned { winner } => {
            format!("{} resigned. {} wins!", winner.other().name(), winner.name())
        }
    }
}

pub fn draw_reason(reason: DrawReason) -> &'static str {
    match reason {
        DrawReason::Stalemate => "stalemate",
        DrawReason::InsufficientMaterial => "insufficient material",
        DrawReason::FiftyMoves => "fifty-move rule",
        DrawReason::Repetition => "threefold repetition",
    }
}

/// MM:SS, minutes keep growing past an hour
pub fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Numbered move pairs: "1. e4 e5", "2. Nf3"
pub fn move_list(moves: &[String]) -> Vec<String> {
    moves
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| format!("{}. {}", i + 1, pair.join(" ")))
        .collect()
}

fn piece_symbol(kind: PieceKind, color: Side) -> char {
    match color {
        Side::White => kind.char().to_ascii_uppercase(),
        Side::Black => kind.char(),
    }
}

/// Piece letters by square, read from the FEN placement field
fn placement(fen: &str) -> [[Option<char>; 8]; 8] {
    let mut board = [[None; 8]; 8];
    let field = fen.split(' ').next().unwrap_or_default();
    for (row, rank_text) in field.split('/').take(8).enumerate() {
        let rank = 7 - row;
        let mut file = 0usize;
        for c in rank_text.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as usize;
            } else if file < 8 {
                board[rank][file] = Some(c);
                file += 1;
            }
        }
    }
    board
}

/// ASCII board from the user's side. Markers around a square:
/// `[ ]` selected, `( )` target, `< >` queued pre-move, `' '` last move.
pub fn render_board(view: &BoardView) -> String {
    let board = placement(&view.fen);
    let ranks: Vec<usize> = match view.player {
        Side::White => (0..8).rev().collect(),
        Side::Black => (0..8).collect(),
    };
    let files: Vec<usize> = match view.player {
        Side::White => (0..8).collect(),
        Side::Black => (0..8).rev().collect(),
    };

    let mut out = String::new();
    for &rank in &ranks {
        let _ = write!(out, "{} ", rank + 1);
        for &file in &files {
            let square = Square::from_coords(File::new(file as u32), Rank::new(rank as u32));
            let piece = board[rank][file].unwrap_or('.');
            let (open, close) = if view.selected == Some(square) {
                ('[', ']')
            } else if view.targets.contains(&square) {
                ('(', ')')
            } else if view.premove.is_some_and(|p| p.from == square || p.to == square) {
                ('<', '>')
            } else if view.last_move.is_some_and(|m| m.touches(square)) {
                ('\'', '\'')
            } else {
                (' ', ' ')
            };
            let _ = write!(out, "{open}{piece}{close}");
        }
        out.push('\n');
    }
    out.push_str("  ");
    for &file in &files {
        let _ = write!(out, " {} ", (b'a' + file as u8) as char);
    }
    out.push('\n');
    out
}

fn captured_line(view: &BoardView, color: Side) -> String {
    view.captured
        .iter()
        .filter(|piece| piece.color == color)
        .map(|piece| piece_symbol(piece.kind, piece.color))
        .collect()
}

/// Full screen: opponent header, board, clocks, status and move list
pub fn render(view: &BoardView) -> String {
    let mut out = String::new();
    let opponent = view.player.other();
    let _ = writeln!(
        out,
        "{} ({}, {}) {}  {}",
        view.opponent.name,
        view.opponent.rating,
        view.difficulty,
        format_clock(view.clocks.of(opponent)),
        captured_line(view, view.player),
    );
    out.push_str(&render_board(view));
    let _ = writeln!(
        out,
        "You ({}) {}  {}",
        view.player.name(),
        format_clock(view.clocks.of(view.player)),
        captured_line(view, opponent),
    );

    let mut status = status_line(view.status, view.turn);
    if let GameStatus::Draw(reason) = view.status {
        let _ = write!(status, " ({})", draw_reason(reason));
    }
    if view.engine_thinking && !view.game_over {
        status.push_str(" - thinking...");
    }
    let _ = writeln!(out, "{status}");

    if let Some(pending) = view.pending_promotion {
        let _ = writeln!(
            out,
            "Promote {}{}: choose q, r, b or n (or cancel)",
            pending.from, pending.to
        );
    }
    if let Some(hint) = view.hint {
        let _ = writeln!(out, "Hint: {hint}");
    }
    if !view.is_live() {
        let _ = writeln!(
            out,
            "Viewing position {} of {}",
            view.cursor,
            view.moves.len() + 1
        );
    }
    for line in move_list(&view.moves) {
        let _ = writeln!(out, "{line}");
    }
    out
}
