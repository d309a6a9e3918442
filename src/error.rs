use std::{io, time::Duration};

use crate::frames::{FrameParseError, Opcode};

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a connection terminated other than the `close` command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("upgrade failed: {0}")]
    Upgrade(#[from] UpgradeError),
    #[error("malformed frame: {0}")]
    Decode(#[from] FrameParseError),
    #[error("unsupported opcode {0:?}")]
    UnsupportedOpcode(Opcode),
    #[error("no data received within {0:?}")]
    ReadTimeout(Duration),
    #[error("peer closed the connection")]
    PeerClosed,
    /// The connection was already torn down.
    #[error("connection is closed")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur when upgrading a TCP stream to a WebSocket.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Failed to read from the TCP stream.
    #[error("failed to read handshake: {0}")]
    Read(io::Error),
    /// Failed to write to the TCP steam.
    #[error("failed to write handshake: {0}")]
    Write(io::Error),
    /// Stream ended before the request head was complete.
    #[error("stream ended during handshake")]
    Truncated,
    /// Request head exceeded the size limit.
    #[error("handshake exceeds {0} bytes")]
    TooLarge(usize),
    /// Client sent something other than `GET <path> HTTP/1.1`.
    #[error("invalid request line {0:?}")]
    RequestLine(String),
    /// Server returned an unexpected HTTP status line.
    #[error("unexpected status line {0:?}")]
    StatusLine(String),
    /// Missing header from upgrade request.
    #[error("missing header {0}")]
    MissingHeader(&'static str),
    /// A handshake header did not match expectations.
    #[error("header {field}: expected {expected:?}, got {got:?}")]
    Header {
        /// The name of the header field.
        field: &'static str,
        /// The expected value.
        expected: String,
        /// The actual value, if any.
        got: Option<String>,
    },
    /// Tried to connect to invalid url.
    #[error("invalid url {0:?}")]
    InvalidUrl(String),
    /// Failed to establish TCP connection.
    #[error("failed to connect: {0}")]
    Connect(io::Error),
    /// The upgrade did not complete in time.
    #[error("timed out")]
    Timeout,
}

/// Failures reported by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend i/o: {0}")]
    Io(#[from] io::Error),
    /// Reply could not be parsed.
    #[error("backend protocol: {0}")]
    Protocol(String),
    /// Backend answered with an error reply.
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),
}
