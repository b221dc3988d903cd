use chess::{Board, BoardStatus, ChessMove, File, Rank, Square};
use tracing::warn;

use crate::board::{BoardEngine, GameStatus, Piece, PieceKind};
use crate::protocol::{Color, Coord, Promotion};

#[derive(Clone, Default)]
pub struct ChessBoard {
    board: Board,
    // The chess crate applies whole moves, so a clear/place pair issued ahead
    // of an update is staged here and consumed by that update.
    staged_origin: Option<Square>,
    staged_promotion: Option<Promotion>,
    last_promotion: Option<Promotion>,
}

impl ChessBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_board(board: Board) -> Self {
        Self {
            board,
            ..Self::default()
        }
    }

    pub fn side_to_move(&self) -> Color {
        from_chess_color(self.board.side_to_move())
    }

    pub fn status(&self) -> GameStatus {
        match self.board.status() {
            BoardStatus::Ongoing => GameStatus::Ongoing,
            BoardStatus::Stalemate => GameStatus::Draw,
            // The side to move is the side that got mated.
            BoardStatus::Checkmate => GameStatus::win_for(self.side_to_move().opposite()),
        }
    }

    /// ASCII diagram labelled with engine coordinates; uppercase is White.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for y in 0..8u8 {
            out.push_str(&format!("{y} "));
            for x in 0..8u8 {
                let symbol = square(Coord::new(x, y))
                    .and_then(|sq| Some((self.board.piece_on(sq)?, self.board.color_on(sq)?)))
                    .map_or('.', |(piece, color)| symbol(piece, color));
                out.push(symbol);
                out.push(' ');
            }
            out.push('\n');
        }
        out.push_str("  0 1 2 3 4 5 6 7");
        out
    }

    fn candidate(&self, origin: Square, dest: Square, promotion: Option<Promotion>) -> ChessMove {
        let promotes = self.board.piece_on(origin) == Some(chess::Piece::Pawn)
            && self
                .board
                .color_on(origin)
                .is_some_and(|color| dest.get_rank() == back_rank_of_opponent(color));
        let promotion = promotes.then(|| chess_piece(promotion.unwrap_or(Promotion::Queen)));
        ChessMove::new(origin, dest, promotion)
    }
}

impl BoardEngine for ChessBoard {
    fn select_piece(&self, at: Coord, color: Color) -> Option<Piece> {
        let sq = square(at)?;
        if self.board.color_on(sq)? != to_chess_color(color) {
            return None;
        }
        let kind = kind_of(self.board.piece_on(sq)?);
        Some(Piece::new(kind, color, at))
    }

    fn valid_move_made(&mut self, to: Coord, piece: &Piece, color: Color) -> bool {
        if piece.color != color || self.side_to_move() != color {
            return false;
        }
        let (Some(origin), Some(dest)) = (square(piece.at), square(to)) else {
            return false;
        };
        self.board
            .legal(self.candidate(origin, dest, promotion_of(piece)))
    }

    fn update_board(&mut self, to: Coord, piece: Piece) -> GameStatus {
        let origin = self.staged_origin.take().or_else(|| square(piece.at));
        let promotion = self
            .staged_promotion
            .take()
            .or_else(|| promotion_of(&piece));
        self.last_promotion = None;

        let (Some(origin), Some(dest)) = (origin, square(to)) else {
            warn!(from = %piece.at, to = %to, "board update outside the board");
            return self.status();
        };
        let mv = self.candidate(origin, dest, promotion);
        if !self.board.legal(mv) {
            warn!(%mv, "ignoring illegal board update");
            return self.status();
        }

        self.board = self.board.make_move_new(mv);
        if mv.get_promotion().is_some() {
            self.last_promotion = Some(promotion.unwrap_or(Promotion::Queen));
        }
        self.status()
    }

    fn last_promotion(&self) -> Option<Promotion> {
        self.last_promotion
    }

    fn clear_square(&mut self, at: Coord) {
        self.staged_origin = square(at);
    }

    fn place_piece(&mut self, _at: Coord, piece: Piece) {
        self.staged_promotion = promotion_of(&piece);
    }
}

// x is the file (0 = a), y the row from White's far side (0 = rank 8).
fn square(at: Coord) -> Option<Square> {
    if at.x > 7 || at.y > 7 {
        return None;
    }
    Some(Square::make_square(
        Rank::from_index(7 - usize::from(at.y)),
        File::from_index(usize::from(at.x)),
    ))
}

fn back_rank_of_opponent(color: chess::Color) -> Rank {
    match color {
        chess::Color::White => Rank::Eighth,
        chess::Color::Black => Rank::First,
    }
}

fn promotion_of(piece: &Piece) -> Option<Promotion> {
    match piece.kind {
        PieceKind::Queen => Some(Promotion::Queen),
        PieceKind::Rook => Some(Promotion::Rook),
        PieceKind::Knight => Some(Promotion::Knight),
        PieceKind::Bishop => Some(Promotion::Bishop),
        PieceKind::Pawn | PieceKind::King => None,
    }
}

fn chess_piece(promotion: Promotion) -> chess::Piece {
    match promotion {
        Promotion::Queen => chess::Piece::Queen,
        Promotion::Rook => chess::Piece::Rook,
        Promotion::Knight => chess::Piece::Knight,
        Promotion::Bishop => chess::Piece::Bishop,
    }
}

fn kind_of(piece: chess::Piece) -> PieceKind {
    match piece {
        chess::Piece::Pawn => PieceKind::Pawn,
        chess::Piece::Knight => PieceKind::Knight,
        chess::Piece::Bishop => PieceKind::Bishop,
        chess::Piece::Rook => PieceKind::Rook,
        chess::Piece::Queen => PieceKind::Queen,
        chess::Piece::King => PieceKind::King,
    }
}

fn to_chess_color(color: Color) -> chess::Color {
    match color {
        Color::White => chess::Color::White,
        Color::Black => chess::Color::Black,
    }
}

fn from_chess_color(color: chess::Color) -> Color {
    match color {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

fn symbol(piece: chess::Piece, color: chess::Color) -> char {
    let symbol = match piece {
        chess::Piece::Pawn => 'p',
        chess::Piece::Knight => 'n',
        chess::Piece::Bishop => 'b',
        chess::Piece::Rook => 'r',
        chess::Piece::Queen => 'q',
        chess::Piece::King => 'k',
    };
    match color {
        chess::Color::White => symbol.to_ascii_uppercase(),
        chess::Color::Black => symbol,
    }
}
