use thiserror::Error;

use crate::protocol::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FieldError(pub &'static str);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed handshake {line:?}: {reason}")]
    HandshakeMalformed { line: String, reason: FieldError },
    #[error("cannot decode {line:?}: {reason}")]
    Decode { line: String, reason: FieldError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("session is full ({capacity} players already registered)")]
    CapacityExceeded { capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("the game is already over")]
    GameOver,
    #[error("no opponent has joined yet")]
    OpponentNotConnected,
    #[error("move made out of turn")]
    NotYourTurn,
    #[error("no piece of the moving side at {0}")]
    NoPiece(Coord),
    #[error("board engine rejected {from} -> {to}")]
    Illegal { from: Coord, to: Coord },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Decode(#[from] ProtocolError),
    #[error("remote move rejected: {0}")]
    Rejected(#[from] MoveError),
    #[error("unexpected message mid-game: {line:?}")]
    Unexpected { line: String },
}
