mod connection;
mod dispatch;
mod handshake;
mod transport;

pub use connection::{ConnState, Connection, handle};
pub use dispatch::{
    Action, CLOSE_COMMAND, Dispatcher, Mode, PING_PAYLOAD, PONG_PAYLOAD, TEXT_REQUIRED,
};
pub use handshake::accept_key;
pub use transport::{FrameStream, ReadOutcome};
