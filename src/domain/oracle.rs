//! Rules oracle - legality adjudication for the session.
//!
//! The session treats the rules as an external collaborator: it hands over a
//! position and a candidate move and gets back either the resulting position
//! or a rejection. [`StandardRules`] is the shakmaty-backed implementation.

use shakmaty::attacks;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{Bitboard, Board, Chess, Color, File, Move as SMove, Position as _, Rank, Role, Square};

use crate::domain::chess::{CapturedPiece, Move, PieceKind, Side};
use crate::domain::position::Position;
use crate::error::IllegalMove;

/// Why a position is drawn
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    FiftyMoves,
    Repetition,
}

/// Terminal-state summary of a single position
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Adjudication {
    pub check: bool,
    pub checkmate: bool,
    pub draw: Option<DrawReason>,
}

impl Adjudication {
    pub fn is_game_over(&self) -> bool {
        self.checkmate || self.draw.is_some()
    }
}

/// Everything the oracle reports about an accepted move
#[derive(Clone, Debug)]
pub struct MoveResult {
    /// Position after the move
    pub position: Position,
    /// The move as played, with the promotion piece filled in
    pub played: Move,
    /// Side that made the move
    pub mover: Side,
    pub captured: Option<CapturedPiece>,
    pub san: String,
    pub is_castle: bool,
    pub is_promotion: bool,
    pub adjudication: Adjudication,
}

impl MoveResult {
    pub fn is_check(&self) -> bool {
        self.adjudication.check
    }

    pub fn is_checkmate(&self) -> bool {
        self.adjudication.checkmate
    }

    pub fn is_draw(&self) -> bool {
        self.adjudication.draw.is_some()
    }

    pub fn is_game_over(&self) -> bool {
        self.adjudication.is_game_over()
    }
}

/// Pure rules adjudication consumed by the session
pub trait RulesOracle {
    /// Play `mv` in `position`, or reject it without side effects
    fn try_move(&self, position: &Position, mv: &Move) -> Result<MoveResult, IllegalMove>;

    /// Check, checkmate and draw state of a position (repetition excluded)
    fn adjudicate(&self, position: &Position) -> Adjudication;

    fn turn_of(&self, position: &Position) -> Side;

    fn piece_at(&self, position: &Position, square: Square) -> Option<(Side, PieceKind)>;

    /// Whether `from -> to` moves a pawn onto its last rank
    fn is_promotion_move(&self, position: &Position, from: Square, to: Square) -> bool {
        matches!(
            self.piece_at(position, from),
            Some((side, PieceKind::Pawn)) if to.rank() == side.last_rank()
        )
    }

    fn is_game_over(&self, position: &Position) -> bool {
        self.adjudicate(position).is_game_over()
    }

    /// Destination squares of legal moves from `from` for the side to move
    fn legal_targets(&self, position: &Position, from: Square) -> Vec<Square>;

    /// Destination squares `side` could reach from `from` if it were its turn.
    /// Used to preview pre-moves while the opponent is to move.
    fn premove_targets(&self, position: &Position, from: Square, side: Side) -> Vec<Square>;
}

/// Standard chess rules backed by shakmaty
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardRules;

impl StandardRules {
    pub fn new() -> Self {
        Self
    }

    /// (from, to) as the user would click it. Castling is the king's
    /// two-square hop rather than king-takes-rook.
    fn click_squares(m: &SMove) -> Option<(Square, Square)> {
        match m {
            SMove::Normal { from, to, .. } => Some((*from, *to)),
            SMove::EnPassant { from, to } => Some((*from, *to)),
            SMove::Castle { king, rook } => {
                let king_dest = if rook.file() == File::H {
                    Square::from_coords(File::G, rook.rank())
                } else {
                    Square::from_coords(File::C, rook.rank())
                };
                Some((*king, king_dest))
            }
            SMove::Put { .. } => None,
        }
    }

    /// Squares the piece on `from` could reach by its movement pattern
    /// alone, without asking whether its own king would be left in check.
    /// Castling is not offered.
    fn pseudo_targets(board: &Board, from: Square, color: Color) -> Vec<Square> {
        let Some(piece) = board.piece_at(from) else {
            return Vec::new();
        };
        if piece.color != color {
            return Vec::new();
        }
        let occupied = board.occupied();
        let reach = match piece.role {
            Role::Pawn => {
                let mut reach = attacks::pawn_attacks(color, from) & board.by_color(!color);
                let (step, home) = match color {
                    Color::White => (8, Rank::Second),
                    Color::Black => (-8, Rank::Seventh),
                };
                if let Some(one) = from.offset(step).filter(|sq| !occupied.contains(*sq)) {
                    reach.add(one);
                    if from.rank() == home {
                        if let Some(two) = one.offset(step).filter(|sq| !occupied.contains(*sq)) {
                            reach.add(two);
                        }
                    }
                }
                reach
            }
            Role::Knight => attacks::knight_attacks(from),
            Role::Bishop => attacks::bishop_attacks(from, occupied),
            Role::Rook => attacks::rook_attacks(from, occupied),
            Role::Queen => attacks::queen_attacks(from, occupied),
            Role::King => attacks::king_attacks(from),
        };
        let reach: Bitboard = reach & !board.by_color(color);
        reach.into_iter().collect()
    }

    fn targets_in(chess: &Chess, from: Square) -> Vec<Square> {
        let mut targets: Vec<Square> = chess
            .legal_moves()
            .iter()
            .filter_map(Self::click_squares)
            .filter(|(move_from, _)| *move_from == from)
            .map(|(_, to)| to)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }
}

impl RulesOracle for StandardRules {
    fn try_move(&self, position: &Position, mv: &Move) -> Result<MoveResult, IllegalMove> {
        let not_legal = || IllegalMove::NotLegal {
            from: mv.from.to_string(),
            to: mv.to.to_string(),
        };

        let promotion = match mv.promotion {
            Some(kind) if !kind.is_promotion_choice() => {
                return Err(IllegalMove::BadPromotion(kind.char()));
            }
            Some(kind) => Some(Role::from(kind)),
            None => None,
        };

        if self.adjudicate(position).is_game_over() {
            return Err(IllegalMove::GameOver);
        }
        let chess = position.chess();

        let uci = UciMove::Normal {
            from: mv.from,
            to: mv.to,
            promotion,
        };
        let legal = uci.to_move(chess).map_err(|_| not_legal())?;

        let mover = Side::from(chess.turn());
        let san = San::from_move(chess, legal.clone()).to_string();
        let captured = legal.capture().map(|role| CapturedPiece {
            kind: PieceKind::from(role),
            color: mover.other(),
        });
        let is_castle = legal.is_castle();
        let is_promotion = legal.is_promotion();
        let played = Move {
            from: mv.from,
            to: mv.to,
            promotion: legal.promotion().map(PieceKind::from),
        };

        let next = chess.clone().play(legal).map_err(|_| not_legal())?;
        let position = Position::from_chess(next);
        let adjudication = self.adjudicate(&position);

        let suffix = if adjudication.checkmate {
            "#"
        } else if adjudication.check {
            "+"
        } else {
            ""
        };

        Ok(MoveResult {
            position,
            played,
            mover,
            captured,
            san: format!("{san}{suffix}"),
            is_castle,
            is_promotion,
            adjudication,
        })
    }

    fn adjudicate(&self, position: &Position) -> Adjudication {
        let chess = position.chess();
        let checkmate = chess.is_checkmate();
        let draw = if checkmate {
            None
        } else if chess.is_stalemate() {
            Some(DrawReason::Stalemate)
        } else if chess.is_insufficient_material() {
            Some(DrawReason::InsufficientMaterial)
        } else if chess.halfmoves() >= 100 {
            Some(DrawReason::FiftyMoves)
        } else {
            None
        };
        Adjudication {
            check: chess.is_check(),
            checkmate,
            draw,
        }
    }

    fn turn_of(&self, position: &Position) -> Side {
        Side::from(position.chess().turn())
    }

    fn piece_at(&self, position: &Position, square: Square) -> Option<(Side, PieceKind)> {
        position
            .chess()
            .board()
            .piece_at(square)
            .map(|piece| (Side::from(piece.color), PieceKind::from(piece.role)))
    }

    fn legal_targets(&self, position: &Position, from: Square) -> Vec<Square> {
        Self::targets_in(position.chess(), from)
    }

    fn premove_targets(&self, position: &Position, from: Square, side: Side) -> Vec<Square> {
        if self.turn_of(position) == side {
            return self.legal_targets(position, from);
        }

        // Hand the move to `side` and drop the en-passant square, which only
        // belongs to the real side to move.
        let mut fields: Vec<&str> = position.fen().split(' ').collect();
        if fields.len() < 4 {
            return Vec::new();
        }
        let turn = side.char().to_string();
        fields[1] = &turn;
        fields[3] = "-";
        match Position::from_fen(&fields.join(" ")) {
            Ok(flipped) => Self::targets_in(flipped.chess(), from),
            // the opponent is in check, which has no legal flipped form
            Err(_) => Self::pseudo_targets(position.chess().board(), from, side.into()),
        }
    }
}
