use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::mpsc,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    board::Surface,
    cli::ClientArgs,
    clock::Timer,
    console::{ConsoleCommand, HELP},
    engine::ChessBoard,
    game::Game,
    protocol::{Handshake, Message, PlayerInfo, next_line, read_message, write_line, write_message},
    sync::{SyncEngine, SyncEvent},
};

const FRAME: Duration = Duration::from_millis(50);

/// A registered connection to the relay. Lines read from the socket arrive on
/// `inbound`; lines sent on `outbound` are written in order.
pub struct RelayLink {
    pub identity: PlayerInfo,
    pub inbound: mpsc::UnboundedReceiver<String>,
    pub outbound: mpsc::UnboundedSender<String>,
    writer: JoinHandle<()>,
}

impl RelayLink {
    pub async fn close(self) {
        finish_writer(self.outbound, self.writer).await;
    }
}

/// Sends the handshake and waits for the relay to assign an identity.
pub async fn connect(server: SocketAddr, handshake: &Handshake) -> Result<RelayLink> {
    let stream = TcpStream::connect(server)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;

    info!("connected to {}", server);

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    write_message(&mut writer, handshake).await?;
    let identity = match read_message::<_, Message>(&mut lines).await? {
        Some(Message::Identity(info)) => info,
        Some(Message::Rejected { reason }) => anyhow::bail!("relay rejected the handshake: {reason}"),
        Some(other) => anyhow::bail!("expected an identity from the relay, got {other}"),
        None => anyhow::bail!("relay closed the connection before assigning an identity"),
    };

    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    tokio::spawn(pump_inbound(lines, inbound_tx));
    let writer = tokio::spawn(pump_outbound(writer, outbound_rx));

    Ok(RelayLink {
        identity,
        inbound,
        outbound,
        writer,
    })
}

async fn pump_inbound(mut lines: Lines<BufReader<OwnedReadHalf>>, inbound: mpsc::UnboundedSender<String>) {
    loop {
        match next_line(&mut lines).await {
            Ok(Some(line)) => {
                if inbound.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("relay closed the connection");
                break;
            }
            Err(error) => {
                warn!(?error, "failed to read from relay");
                break;
            }
        }
    }
}

async fn finish_writer(outbound: mpsc::UnboundedSender<String>, writer: JoinHandle<()>) {
    drop(outbound);
    if let Err(error) = writer.await {
        warn!(?error, "relay writer task failed");
    }
}

async fn pump_outbound(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = outbound.recv().await {
        if let Err(error) = write_line(&mut writer, &line).await {
            warn!(?error, "failed to write to relay");
            return;
        }
    }
    shutdown_connection(&mut writer).await;
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let handshake = Handshake::new(args.name, args.color, args.time).context("invalid player name")?;
    let link = connect(args.server, &handshake).await?;

    let RelayLink {
        identity,
        inbound,
        outbound,
        writer,
    } = link;
    write_stdout(&format!(
        "*** connected as {} (player {}, {})",
        identity.name, identity.id, identity.color
    ))
    .await?;
    if identity.color != handshake.color {
        write_stdout(&format!(
            "*** {} was taken, playing {}",
            handshake.color, identity.color
        ))
        .await?;
    }

    let mut game = Game::new(ChessBoard::new(), identity);
    let mut sync = SyncEngine::new(inbound);
    let mut screen = Screen::default();
    screen.request_redraw();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    run_client_loop(&mut game, &mut sync, &mut screen, &mut stdin, &outbound).await?;

    finish_writer(outbound, writer).await;

    Ok(())
}

async fn run_client_loop(
    game: &mut Game<ChessBoard>,
    sync: &mut SyncEngine,
    screen: &mut Screen,
    stdin: &mut Lines<BufReader<Stdin>>,
    outbound: &mpsc::UnboundedSender<String>,
) -> Result<()> {
    let mut frame = interval(FRAME);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock = interval(Duration::from_secs(1));
    clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
    clock.tick().await;

    loop {
        screen.refresh(game).await?;
        select! {
            _ = frame.tick() => {
                if !handle_sync_event(sync.poll(game, screen)).await? {
                    break;
                }
            }
            _ = clock.tick() => {
                game.tick_second();
            }
            line = stdin.next_line() => {
                if !handle_stdin_input(line, game, screen, outbound).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                break;
            }
        }
    }
    Ok(())
}

async fn handle_sync_event(event: SyncEvent) -> Result<bool> {
    match event {
        SyncEvent::Idle | SyncEvent::Dropped(_) => {}
        SyncEvent::OpponentJoined(info) => {
            write_stdout(&format!(
                "*** {} joined as {} ({})",
                info.name, info.color, info.time
            ))
            .await?;
        }
        SyncEvent::MoveApplied { mv, .. } => {
            write_stdout(&format!("*** opponent played {mv}")).await?;
        }
        SyncEvent::Disconnected => {
            write_stdout("*** relay closed the connection").await?;
            return Ok(false);
        }
    }
    Ok(true)
}

async fn handle_stdin_input(
    line: io::Result<Option<String>>,
    game: &mut Game<ChessBoard>,
    screen: &mut Screen,
    outbound: &mpsc::UnboundedSender<String>,
) -> Result<bool> {
    let Some(line) = line? else {
        return Ok(false);
    };
    if line.trim().is_empty() {
        return Ok(true);
    }

    match ConsoleCommand::parse(&line) {
        Ok(ConsoleCommand::Move {
            from,
            to,
            promotion,
        }) => match game.apply_local_move(from, to, promotion, screen) {
            Ok(mv) => {
                if outbound.send(Message::Move(mv).to_string()).is_err() {
                    write_stderr("!!! relay connection lost").await?;
                    return Ok(false);
                }
            }
            Err(err) => write_stderr(&format!("!!! {err}")).await?,
        },
        Ok(ConsoleCommand::Board) => screen.request_redraw(),
        Ok(ConsoleCommand::Status) => write_stdout(&status_line(game)).await?,
        Ok(ConsoleCommand::Help) => write_stdout(HELP).await?,
        Ok(ConsoleCommand::Quit) => {
            write_stdout("*** leaving game").await?;
            return Ok(false);
        }
        Err(err) => write_stderr(&format!("!!! {err}")).await?,
    }
    Ok(true)
}

fn status_line(game: &Game<ChessBoard>) -> String {
    let opponent = game
        .opponent()
        .map_or_else(|| "waiting for opponent".to_string(), |info| format!("opponent {}", info.name));
    let turn = if game.your_turn() { "your move" } else { "their move" };
    let clock = |timer: Option<&Timer>| {
        timer.map_or_else(|| "untimed".to_string(), ToString::to_string)
    };
    format!(
        "*** {} as {}, {turn}, {opponent}; clocks: {} / {}",
        game.identity().name,
        game.color(),
        clock(game.clocks().yours()),
        clock(game.clocks().opponents()),
    )
}

#[derive(Debug, Default)]
struct Screen {
    redraw: bool,
    outcome_shown: bool,
}

impl Surface for Screen {
    fn request_redraw(&mut self) {
        self.redraw = true;
    }
}

impl Screen {
    async fn refresh(&mut self, game: &Game<ChessBoard>) -> io::Result<()> {
        if std::mem::take(&mut self.redraw) {
            write_stdout(&game.engine().render()).await?;
            if game.outcome().is_none() {
                let prompt = if game.opponent().is_none() {
                    "*** waiting for an opponent to join"
                } else if game.your_turn() {
                    "*** your move"
                } else {
                    "*** waiting for opponent's move"
                };
                write_stdout(prompt).await?;
            }
        }
        if self.outcome_shown {
            return Ok(());
        }
        if let Some(outcome) = game.outcome() {
            self.outcome_shown = true;
            write_stdout(&format!("*** game over: {outcome}")).await?;
        }
        Ok(())
    }
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(writer: &mut OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shutdown relay writer cleanly");
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}
