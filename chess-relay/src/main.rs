use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chess_relay::{
    cli::{Cli, Command, RelayArgs},
    client,
    relay::Relay,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.command);

    match cli.command {
        Command::Relay(args) => serve(args).await,
        Command::Client(args) => client::run(args).await,
    }
}

// The client shares stdout with the board diagram, so it stays quiet unless asked.
fn init_tracing(command: &Command) {
    let default = match command {
        Command::Relay(_) => "info",
        Command::Client(_) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn serve(args: RelayArgs) -> Result<()> {
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind relay to {}", args.listen))?;
    let relay = Relay::new(listener);
    info!("relay listening on {}", relay.local_addr()?);

    relay
        .run_until_ctrl_c()
        .await
        .inspect_err(|err| warn!("relay exited with error: {err:?}"))
}
