use std::fmt;

use tracing::{debug, info, warn};

use crate::{
    board::{BoardEngine, GameStatus, Piece, PieceKind, Surface},
    clock::{Clocks, Expiry},
    error::MoveError,
    protocol::{Color, Coord, MoveMessage, PlayerInfo, Promotion},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Checkmate { winner: Color },
    Draw,
    Timeout { winner: Color },
}

impl Outcome {
    fn from_status(status: GameStatus) -> Option<Self> {
        match status {
            GameStatus::Ongoing => None,
            GameStatus::WhiteWins => Some(Outcome::Checkmate {
                winner: Color::White,
            }),
            GameStatus::BlackWins => Some(Outcome::Checkmate {
                winner: Color::Black,
            }),
            GameStatus::Draw => Some(Outcome::Draw),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Checkmate { winner } => write!(f, "{winner} wins by checkmate"),
            Outcome::Draw => f.write_str("draw"),
            Outcome::Timeout { winner } => write!(f, "{winner} wins on time"),
        }
    }
}

pub struct Game<E> {
    engine: E,
    identity: PlayerInfo,
    your_turn: bool,
    opponent: Option<PlayerInfo>,
    clocks: Clocks,
    outcome: Option<Outcome>,
}

impl<E: BoardEngine> Game<E> {
    pub fn new(engine: E, identity: PlayerInfo) -> Self {
        let clocks = Clocks::new(&identity.name, &identity.time);
        Self {
            engine,
            your_turn: identity.color == Color::White,
            identity,
            opponent: None,
            clocks,
            outcome: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn identity(&self) -> &PlayerInfo {
        &self.identity
    }

    pub fn color(&self) -> Color {
        self.identity.color
    }

    pub fn your_turn(&self) -> bool {
        self.your_turn
    }

    pub fn opponent(&self) -> Option<&PlayerInfo> {
        self.opponent.as_ref()
    }

    pub fn clocks(&self) -> &Clocks {
        &self.clocks
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn record_opponent(&mut self, info: PlayerInfo) {
        self.clocks.start_opponent(&info.name, &info.time);
        self.opponent = Some(info);
    }

    pub fn check_timers(&mut self) -> Option<Outcome> {
        if self.outcome.is_some() {
            return self.outcome;
        }
        let winner = match self.clocks.expired()? {
            Expiry::Yours => self.color().opposite(),
            Expiry::Opponents => self.color(),
        };
        let outcome = Outcome::Timeout { winner };
        info!(%outcome, "clock expired");
        self.outcome = Some(outcome);
        self.outcome
    }

    /// Called once per elapsed second by the host loop. Clocks only run
    /// while the opponent is connected and the game is live.
    pub fn tick_second(&mut self) -> Option<Outcome> {
        if self.opponent.is_none() || self.outcome.is_some() {
            return self.outcome;
        }
        if let Some(timer) = self.clocks.tick(self.your_turn) {
            debug!(clock = %timer, "tick");
        }
        self.check_timers()
    }

    /// Plays a move chosen on this client and returns the line to send.
    pub fn apply_local_move(
        &mut self,
        from: Coord,
        to: Coord,
        promotion: Option<Promotion>,
        surface: &mut impl Surface,
    ) -> Result<MoveMessage, MoveError> {
        if self.check_timers().is_some() {
            return Err(MoveError::GameOver);
        }
        // The relay would have nobody to forward it to.
        if self.opponent.is_none() {
            return Err(MoveError::OpponentNotConnected);
        }
        if !self.your_turn {
            return Err(MoveError::NotYourTurn);
        }

        let color = self.color();
        let piece = self
            .engine
            .select_piece(from, color)
            .ok_or(MoveError::NoPiece(from))?;
        if !self.engine.valid_move_made(to, &piece, color) {
            return Err(MoveError::Illegal { from, to });
        }

        let moved = match promotion {
            Some(promotion) if piece.kind == PieceKind::Pawn => piece.promoted(promotion),
            _ => piece,
        };
        let status = self.engine.update_board(to, moved);
        self.finish_move(status, surface);

        let message = MoveMessage::new(from, to);
        Ok(match self.engine.last_promotion() {
            Some(promotion) => message.with_promotion(promotion),
            None => message,
        })
    }

    pub fn apply_remote_move(
        &mut self,
        mv: &MoveMessage,
        surface: &mut impl Surface,
    ) -> Result<GameStatus, MoveError> {
        if self.check_timers().is_some() {
            return Err(MoveError::GameOver);
        }
        if self.your_turn {
            return Err(MoveError::NotYourTurn);
        }

        let opponent = self.color().opposite();
        let piece = self
            .engine
            .select_piece(mv.from, opponent)
            .ok_or(MoveError::NoPiece(mv.from))?;
        if !self.engine.valid_move_made(mv.to, &piece, opponent) {
            warn!(from = %mv.from, to = %mv.to, "board engine refused remote move");
            return Err(MoveError::Illegal {
                from: mv.from,
                to: mv.to,
            });
        }

        let status = match mv.promotion {
            Some(promotion) => {
                self.engine.clear_square(mv.from);
                let promoted = Piece::new(promotion.into(), opponent, mv.to);
                self.engine.place_piece(mv.to, promoted);
                self.engine.update_board(mv.to, promoted)
            }
            None => self.engine.update_board(mv.to, piece),
        };
        self.finish_move(status, surface);
        Ok(status)
    }

    fn finish_move(&mut self, status: GameStatus, surface: &mut impl Surface) {
        self.your_turn = !self.your_turn;
        if let Some(outcome) = Outcome::from_status(status) {
            info!(%outcome, code = status.code(), "game over");
            self.outcome = Some(outcome);
        }
        surface.request_redraw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fake::{CountingSurface, FakeEngine};
    use crate::engine::ChessBoard;
    use crate::protocol::TimeControl;

    fn player(id: u32, color: Color, name: &str, time: TimeControl) -> PlayerInfo {
        PlayerInfo {
            id,
            color,
            name: name.into(),
            time,
        }
    }

    fn pawn(color: Color, x: u8, y: u8) -> Piece {
        Piece::new(PieceKind::Pawn, color, Coord::new(x, y))
    }

    fn white_game<E: BoardEngine>(engine: E) -> Game<E> {
        let mut game = Game::new(engine, player(1, Color::White, "alice", TimeControl::Untimed));
        game.record_opponent(player(2, Color::Black, "bob", TimeControl::Untimed));
        game
    }

    fn black_game(engine: FakeEngine) -> Game<FakeEngine> {
        let mut game = Game::new(engine, player(2, Color::Black, "bob", TimeControl::Untimed));
        game.record_opponent(player(1, Color::White, "alice", TimeControl::Untimed));
        game
    }

    #[test]
    fn white_moves_first() {
        let white = Game::new(
            FakeEngine::default(),
            player(1, Color::White, "alice", TimeControl::Untimed),
        );
        let black = Game::new(
            FakeEngine::default(),
            player(2, Color::Black, "bob", TimeControl::Untimed),
        );
        assert!(white.your_turn());
        assert!(!black.your_turn());
    }

    #[test]
    fn local_move_waits_for_an_opponent() {
        let mut game = Game::new(
            ChessBoard::new(),
            player(1, Color::White, "alice", TimeControl::Untimed),
        );
        let mut surface = CountingSurface::default();

        assert_eq!(
            game.apply_local_move(Coord::new(4, 6), Coord::new(4, 4), None, &mut surface),
            Err(MoveError::OpponentNotConnected)
        );
        assert!(game.your_turn());
        assert_eq!(surface.redraws, 0);

        game.record_opponent(player(2, Color::Black, "bob", TimeControl::Untimed));
        assert!(
            game.apply_local_move(Coord::new(4, 6), Coord::new(4, 4), None, &mut surface)
                .is_ok()
        );
        assert!(!game.your_turn());
    }

    #[test]
    fn turns_strictly_alternate() {
        let mut game = white_game(ChessBoard::new());
        let mut surface = CountingSurface::default();

        let opening = game
            .apply_local_move(Coord::new(4, 6), Coord::new(4, 4), None, &mut surface)
            .expect("e2e4");
        assert_eq!(opening.to_string(), "4-6-4-4");
        assert!(!game.your_turn());

        assert_eq!(
            game.apply_local_move(Coord::new(3, 6), Coord::new(3, 4), None, &mut surface),
            Err(MoveError::NotYourTurn)
        );

        let reply = MoveMessage::new(Coord::new(4, 1), Coord::new(4, 3));
        assert_eq!(
            game.apply_remote_move(&reply, &mut surface),
            Ok(GameStatus::Ongoing)
        );
        assert!(game.your_turn());
        assert_eq!(
            game.apply_remote_move(&reply, &mut surface),
            Err(MoveError::NotYourTurn)
        );
        assert_eq!(surface.redraws, 2);
    }

    #[test]
    fn remote_move_flips_turn_and_redraws() {
        let mut game = black_game(FakeEngine::with_pieces([pawn(Color::White, 6, 6)]));
        let mut surface = CountingSurface::default();

        let mv = MoveMessage::new(Coord::new(6, 6), Coord::new(6, 4));
        assert_eq!(game.apply_remote_move(&mv, &mut surface), Ok(GameStatus::Ongoing));
        assert!(game.your_turn());
        assert_eq!(surface.redraws, 1);
        assert_eq!(game.engine().piece_at(6, 4).map(|p| p.color), Some(Color::White));
    }

    #[test]
    fn remote_promotion_clears_places_then_updates() {
        let mut game = black_game(FakeEngine::with_pieces([pawn(Color::White, 0, 1)]));
        let mut surface = CountingSurface::default();

        let mv = MoveMessage::new(Coord::new(0, 1), Coord::new(0, 0)).with_promotion(Promotion::Knight);
        game.apply_remote_move(&mv, &mut surface)
            .expect("promotion applied");

        assert_eq!(game.engine().calls, ["valid", "clear", "place", "update"]);
        assert_eq!(game.engine().piece_at(0, 1), None);
        let promoted = game.engine().piece_at(0, 0).expect("promoted piece");
        assert_eq!(promoted.kind, PieceKind::Knight);
        assert_eq!(promoted.color, Color::White);
    }

    #[test]
    fn refused_move_leaves_turn_unchanged() {
        let mut engine = FakeEngine::with_pieces([pawn(Color::White, 6, 6)]);
        engine.refuse.insert(Coord::new(6, 3));
        let mut game = black_game(engine);
        let mut surface = CountingSurface::default();

        let mv = MoveMessage::new(Coord::new(6, 6), Coord::new(6, 3));
        assert!(matches!(
            game.apply_remote_move(&mv, &mut surface),
            Err(MoveError::Illegal { .. })
        ));

        let empty = MoveMessage::new(Coord::new(2, 2), Coord::new(2, 3));
        assert_eq!(
            game.apply_remote_move(&empty, &mut surface),
            Err(MoveError::NoPiece(Coord::new(2, 2)))
        );
        assert!(!game.your_turn());
        assert_eq!(surface.redraws, 0);
    }

    #[test]
    fn board_result_ends_the_game() {
        let mut engine = FakeEngine::with_pieces([pawn(Color::White, 6, 6)]);
        engine.status = Some(GameStatus::WhiteWins);
        let mut game = black_game(engine);
        let mut surface = CountingSurface::default();

        let mv = MoveMessage::new(Coord::new(6, 6), Coord::new(6, 5));
        assert_eq!(game.apply_remote_move(&mv, &mut surface), Ok(GameStatus::WhiteWins));
        assert_eq!(
            game.outcome(),
            Some(Outcome::Checkmate {
                winner: Color::White
            })
        );
        assert_eq!(
            game.apply_local_move(Coord::new(0, 1), Coord::new(0, 2), None, &mut surface),
            Err(MoveError::GameOver)
        );
    }

    #[test]
    fn local_promotion_is_tagged_on_the_wire() {
        use std::str::FromStr;

        let position = chess::Board::from_str("8/P7/8/8/8/8/8/k6K w - - 0 1").expect("valid fen");
        let mut game = white_game(ChessBoard::from_board(position));
        let mut surface = CountingSurface::default();

        let mv = game
            .apply_local_move(
                Coord::new(0, 1),
                Coord::new(0, 0),
                Some(Promotion::Bishop),
                &mut surface,
            )
            .expect("promotion is legal");
        assert_eq!(mv.to_string(), "0-1-0-0-PROMOTION:BISHOP");
    }

    #[test]
    fn clocks_wait_for_the_opponent() {
        let mut game = Game::new(
            FakeEngine::default(),
            player(1, Color::White, "alice", TimeControl::Timed { minutes: 0, seconds: 1 }),
        );
        assert_eq!(game.tick_second(), None);
        assert_eq!(game.check_timers(), None);

        game.record_opponent(player(2, Color::Black, "bob", TimeControl::Untimed));
        assert_eq!(
            game.tick_second(),
            Some(Outcome::Timeout {
                winner: Color::Black
            })
        );
    }

    #[test]
    fn opponent_timeout_credits_the_local_player() {
        let mut game = black_game(FakeEngine::with_pieces([pawn(Color::White, 6, 6)]));
        game.record_opponent(player(
            1,
            Color::White,
            "alice",
            TimeControl::Timed {
                minutes: 0,
                seconds: 2,
            },
        ));
        let mut surface = CountingSurface::default();

        assert_eq!(game.tick_second(), None);
        assert_eq!(
            game.tick_second(),
            Some(Outcome::Timeout {
                winner: Color::Black
            })
        );

        let mv = MoveMessage::new(Coord::new(6, 6), Coord::new(6, 5));
        assert_eq!(
            game.apply_remote_move(&mv, &mut surface),
            Err(MoveError::GameOver)
        );
        assert!(!game.your_turn());
    }
}
