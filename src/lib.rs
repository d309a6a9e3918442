#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod backend;
mod client;
pub mod config;
mod error;
pub mod frames;
pub mod protocol;
mod server;
mod ws;

pub use client::BridgeClient;
pub use config::{BackendConfig, Config, ConnConfig, ReadStrategy};
pub use error::{BackendError, Error, Result, UpgradeError};
pub use server::BridgeServer;
pub use ws::{
    Action, CLOSE_COMMAND, ConnState, Connection, Dispatcher, FrameStream, Mode, PING_PAYLOAD,
    PONG_PAYLOAD, ReadOutcome, TEXT_REQUIRED, accept_key, handle,
};

pub(crate) const MAX_FRAME_PAYLOAD: usize = 1024 * 1024;
