use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    error::RegistryError,
    protocol::{Handshake, Message, PlayerId, PlayerInfo},
};

pub const CAPACITY: usize = 2;

pub type Outbox = mpsc::UnboundedSender<String>;

#[derive(Debug)]
struct Connection {
    info: PlayerInfo,
    outbox: Outbox,
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: Vec<Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.connections.len() >= CAPACITY
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.connections.iter().map(|connection| &connection.info)
    }

    /// Adds a player and queues the introductions: `ID` to the newcomer,
    /// `PLAYER` about the newcomer to everyone already present, then `PLAYER`
    /// about each of them to the newcomer.
    pub fn register(
        &mut self,
        handshake: Handshake,
        outbox: Outbox,
    ) -> Result<PlayerInfo, RegistryError> {
        if self.is_full() {
            return Err(RegistryError::CapacityExceeded { capacity: CAPACITY });
        }

        let mut color = handshake.color;
        if self.players().any(|player| player.color == color) {
            color = color.opposite();
        }

        let info = PlayerInfo {
            id: (self.connections.len() + 1) as PlayerId,
            color,
            name: handshake.name,
            time: handshake.time,
        };

        let _ = outbox.send(Message::Identity(info.clone()).to_string());
        let announce = Message::PeerAnnounce(info.clone()).to_string();
        for existing in &self.connections {
            let _ = existing.outbox.send(announce.clone());
            let _ = outbox.send(Message::PeerAnnounce(existing.info.clone()).to_string());
        }

        debug!(id = info.id, color = %info.color, requested = %handshake.color, "registered player");
        self.connections.push(Connection {
            info: info.clone(),
            outbox,
        });
        Ok(info)
    }

    /// Queues `line` unchanged for every connection except `from`. Returns
    /// how many connections it was queued for.
    pub fn forward(&self, from: PlayerId, line: &str) -> usize {
        let mut queued = 0;
        for connection in self.connections.iter().filter(|c| c.info.id != from) {
            if connection.outbox.send(line.to_string()).is_ok() {
                queued += 1;
            }
        }
        queued
    }
}
