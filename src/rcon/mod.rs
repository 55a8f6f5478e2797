//! RCON protocol stack: framing, sessions, typed commands, roster parsing
//!
//! ## Architecture
//!
//! - **packet**: binary frame codec shared by the client and test harnesses
//! - **connection**: one session per socket, timeout-bounded, with a
//!   bounded implicit-reconnect policy on send
//! - **client**: administrative verbs returning `CommandResult` envelopes
//! - **parser**: lenient, pluggable player-list grammar
//!
//! Sessions are plain values; construct one where you need it and drop it
//! when done. There is no pooling and no global client.

pub mod client;
pub mod connection;
pub mod packet;
pub mod parser;

pub use client::{
    probe, RconClient, DEFAULT_BAN_REASON, DEFAULT_KICK_REASON, DEFAULT_RESTART_DELAY_SECS,
};
pub use connection::{
    CommandError, ConnectError, ConnectionOptions, ConnectionState, DisconnectError,
    RconConnection, ReconnectPolicy, DEFAULT_TIMEOUT_MS,
};
pub use parser::{ParseError, PlayerListParser, StandardListParser};
