use std::{
    fmt,
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader, Lines},
    net::{TcpListener, TcpStream},
    select,
    sync::{Mutex, mpsc, watch},
};
use tracing::{debug, info, warn};

use crate::{
    protocol::{Handshake, Message, PlayerId, PlayerInfo, next_line, write_line, write_message},
    error::RegistryError,
    registry::{Outbox, Registry},
};

type SessionId = u64;

pub struct Relay {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl Relay {
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            state: Arc::new(RelayState::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Relay { listener, state } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    handle_shutdown(&state).await;
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &state);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

async fn handle_shutdown(state: &RelayState) {
    info!("relay shutting down");
    state.current.lock().await.close();
}

fn handle_accept_result(result: std::io::Result<(TcpStream, SocketAddr)>, state: &Arc<RelayState>) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, state),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, state: &Arc<RelayState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, peer, state).await {
            warn!(peer = %peer, error = ?err, "connection closed with error");
        }
    });
}

struct RelayState {
    current: Mutex<Arc<Session>>,
    next_session: AtomicU64,
}

impl RelayState {
    fn new() -> Self {
        Self {
            current: Mutex::new(Arc::new(Session::new(1))),
            next_session: AtomicU64::new(2),
        }
    }

    /// Registers a player in the open session, replacing it first if it was
    /// torn down. Holds `current` throughout, so the session cannot be
    /// closed between the check and the registration.
    async fn join(
        &self,
        handshake: Handshake,
        outbox: Outbox,
    ) -> (Arc<Session>, Result<PlayerInfo, RegistryError>) {
        let mut current = self.current.lock().await;
        if current.is_closed() {
            let id = self.next_session.fetch_add(1, Ordering::Relaxed);
            info!(session = id, "opening session");
            *current = Arc::new(Session::new(id));
        }
        let session = Arc::clone(&current);
        let registered = session.registry.lock().await.register(handshake, outbox);
        (session, registered)
    }

    async fn close_session(&self, session: &Session) {
        let _current = self.current.lock().await;
        session.close();
    }
}

struct Session {
    id: SessionId,
    registry: Mutex<Registry>,
    closed: watch::Sender<bool>,
}

impl Session {
    fn new(id: SessionId) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id,
            registry: Mutex::new(Registry::new()),
            closed,
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn close(&self) {
        if !self.closed.send_replace(true) {
            info!(session = self.id, "session closed");
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<RelayState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let handshake = perform_handshake(&mut lines, &mut writer).await?;
    let (outbox, inbox) = mpsc::unbounded_channel();
    let (session, player) = register_player(&state, handshake, outbox, &mut writer).await?;

    info!(
        %peer,
        session = session.id,
        id = player.id,
        color = %player.color,
        name = %player.name,
        "player joined"
    );

    let mut reader = lines.into_inner();
    let result = relay_lines(&session, player.id, &mut reader, &mut writer, inbox).await;
    state.close_session(&session).await;
    info!(%peer, session = session.id, id = player.id, "player left");

    result
}

async fn perform_handshake<R, W>(lines: &mut Lines<R>, writer: &mut W) -> Result<Handshake>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(line) = next_line(lines).await? else {
        anyhow::bail!("connection closed before handshake");
    };

    match line.parse::<Handshake>() {
        Ok(handshake) => Ok(handshake),
        Err(err) => {
            reject(writer, &err).await?;
            Err(err.into())
        }
    }
}

async fn register_player<W>(
    state: &RelayState,
    handshake: Handshake,
    outbox: Outbox,
    writer: &mut W,
) -> Result<(Arc<Session>, PlayerInfo)>
where
    W: AsyncWrite + Unpin,
{
    let (session, registered) = state.join(handshake, outbox).await;

    match registered {
        Ok(player) => Ok((session, player)),
        Err(err) => {
            reject(writer, &err).await?;
            Err(err.into())
        }
    }
}

async fn reject<W>(writer: &mut W, reason: &impl fmt::Display) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_message(
        writer,
        &Message::Rejected {
            reason: reason.to_string(),
        },
    )
    .await?;
    Ok(())
}

/// Pumps lines both ways until this connection ends or the session closes.
/// Queued lines go out to this socket; whatever is read from it is forwarded
/// to the other player as is, blank lines and `\r` included.
async fn relay_lines<R, W>(
    session: &Session,
    id: PlayerId,
    reader: &mut R,
    writer: &mut W,
    mut inbox: mpsc::UnboundedReceiver<String>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut closed = session.subscribe();
    if *closed.borrow_and_update() {
        return Ok(());
    }

    // Kept across iterations: `read_until` resumes a line cut short by another branch.
    let mut pending = Vec::new();
    loop {
        select! {
            biased;
            queued = inbox.recv() => match queued {
                Some(line) => write_line(writer, &line).await?,
                None => break,
            },
            read = reader.read_until(b'\n', &mut pending) => {
                let at_eof = read? == 0;
                if !pending.is_empty() {
                    forward(session, id, &pending).await;
                    pending.clear();
                }
                if at_eof {
                    break;
                }
            }
            _ = closed.changed() => break,
        }
    }

    Ok(())
}

async fn forward(session: &Session, from: PlayerId, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw.strip_suffix(b"\n").unwrap_or(raw));
    let recipients = session.registry.lock().await.forward(from, &line);
    debug!(session = session.id, from, recipients, line = %line.trim_end(), "forwarded line");
}
