use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::{
    board::{BoardEngine, GameStatus, Surface},
    error::SyncError,
    game::Game,
    protocol::{Message, MoveMessage, PlayerInfo},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Idle,
    OpponentJoined(PlayerInfo),
    MoveApplied { mv: MoveMessage, status: GameStatus },
    Dropped(SyncError),
    /// The relay connection is gone and every buffered line was consumed.
    Disconnected,
}

pub struct SyncEngine {
    inbound: mpsc::UnboundedReceiver<String>,
}

impl SyncEngine {
    pub fn new(inbound: mpsc::UnboundedReceiver<String>) -> Self {
        Self { inbound }
    }

    pub fn poll<E: BoardEngine>(
        &mut self,
        game: &mut Game<E>,
        surface: &mut impl Surface,
    ) -> SyncEvent {
        let line = match self.inbound.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => return SyncEvent::Idle,
            Err(TryRecvError::Disconnected) => return SyncEvent::Disconnected,
        };

        match dispatch(&line, game, surface) {
            Ok(event) => event,
            Err(err) => {
                warn!(line = %line, error = %err, "dropping inbound line");
                SyncEvent::Dropped(err)
            }
        }
    }
}

fn dispatch<E: BoardEngine>(
    line: &str,
    game: &mut Game<E>,
    surface: &mut impl Surface,
) -> Result<SyncEvent, SyncError> {
    match line.parse::<Message>()? {
        Message::Move(mv) => {
            let status = game.apply_remote_move(&mv, surface)?;
            debug!(mv = %mv, code = status.code(), "applied remote move");
            Ok(SyncEvent::MoveApplied { mv, status })
        }
        Message::PeerAnnounce(info) => {
            info!(
                opponent = %info.name,
                color = %info.color,
                time = %info.time,
                "opponent joined"
            );
            game.record_opponent(info.clone());
            surface.request_redraw();
            Ok(SyncEvent::OpponentJoined(info))
        }
        Message::Identity(_) | Message::Rejected { .. } => Err(SyncError::Unexpected {
            line: line.to_string(),
        }),
    }
}
