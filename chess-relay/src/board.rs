use crate::protocol::{Color, Coord, Promotion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl From<Promotion> for PieceKind {
    fn from(promotion: Promotion) -> Self {
        match promotion {
            Promotion::Queen => PieceKind::Queen,
            Promotion::Rook => PieceKind::Rook,
            Promotion::Knight => PieceKind::Knight,
            Promotion::Bishop => PieceKind::Bishop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
    pub at: Coord,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color, at: Coord) -> Self {
        Self { kind, color, at }
    }

    pub fn promoted(self, promotion: Promotion) -> Self {
        Self {
            kind: promotion.into(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameStatus {
    /// `0` ongoing, `1` White wins, `2` Black wins, `3` draw.
    pub fn code(self) -> u8 {
        match self {
            GameStatus::Ongoing => 0,
            GameStatus::WhiteWins => 1,
            GameStatus::BlackWins => 2,
            GameStatus::Draw => 3,
        }
    }

    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameStatus::WhiteWins,
            Color::Black => GameStatus::BlackWins,
        }
    }
}

/// Move legality and board state, consumed through the narrow interface the
/// sync core needs.
pub trait BoardEngine {
    /// The piece of `color` standing on `at`, if any.
    fn select_piece(&self, at: Coord, color: Color) -> Option<Piece>;

    /// Whether moving `piece` to `to` is legal for `color`. May update the
    /// engine's special-move bookkeeping (en passant, castling rights).
    fn valid_move_made(&mut self, to: Coord, piece: &Piece, color: Color) -> bool;

    /// Moves `piece` to `to` and reports the resulting game status.
    fn update_board(&mut self, to: Coord, piece: Piece) -> GameStatus;

    /// The piece a pawn promoted to on the last update, if it promoted.
    fn last_promotion(&self) -> Option<Promotion>;

    fn clear_square(&mut self, at: Coord);

    /// Puts a freshly constructed piece on `at` ahead of the update that
    /// completes the move.
    fn place_piece(&mut self, at: Coord, piece: Piece);
}

pub trait Surface {
    fn request_redraw(&mut self);
}
