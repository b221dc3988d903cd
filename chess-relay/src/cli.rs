use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::protocol::{Color, TimeControl};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay that pairs two players and forwards their moves.
    Relay(RelayArgs),
    /// Connect to a relay and play from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RelayArgs {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Address of the relay to connect to.
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub server: SocketAddr,

    /// Display name; may not contain ':' or '-'.
    #[arg(long)]
    pub name: String,

    /// Requested color. The relay assigns the other one if it is taken.
    #[arg(long, default_value = "White")]
    pub color: Color,

    /// Time control as MINUTES:SECONDS, or M:S for an untimed game.
    #[arg(long, default_value = "M:S")]
    pub time: TimeControl,
}
