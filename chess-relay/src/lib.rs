//! Two-player chess over a line-oriented TCP relay.
//!
//! The relay pairs two players, settles who plays which color and then
//! forwards every line one player sends to the other without looking at it.
//! Each client keeps its own board, enforces turn order on what it receives
//! and runs both players' clocks.
//!
//! - [`protocol`] encodes and decodes the wire messages.
//! - [`registry`] assigns identities and colors within one session.
//! - [`relay`] accepts connections and forwards lines between the players of
//!   a session, tearing the session down when either side leaves.
//! - [`board`] declares the board engine and rendering seams; [`engine`]
//!   implements the board engine on top of the `chess` crate.
//! - [`clock`] and [`game`] hold the client's turn, clock and result state.
//! - [`sync`] applies relayed lines to the local game without blocking.
//! - [`client`], [`console`] and [`cli`] make up the terminal front end.

pub mod board;
pub mod cli;
pub mod client;
pub mod clock;
pub mod console;
pub mod engine;
pub mod error;
pub mod game;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod sync;
