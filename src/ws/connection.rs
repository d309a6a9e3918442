use tokio::io::{AsyncRead, AsyncWrite};

use super::{
    dispatch::{Action, Dispatcher},
    transport::{FrameStream, ReadOutcome},
};
use crate::{
    config::{ConnConfig, ReadStrategy},
    error::{Error, Result},
};

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Upgrading,
    Active,
    Closing,
    Closed,
}

/// One client session over a byte stream.
pub struct Connection<S> {
    stream: FrameStream<S>,
    remote: String,
    state: ConnState,
    read: ReadStrategy,
}

/// Serves one connection from upgrade to teardown.
///
/// Returns `Ok(())` when the client sent the `close` command, otherwise the
/// error that ended the session. The stream is shut down exactly once on every
/// path; a failure to do so is logged and never replaces the returned result.
pub async fn handle<S>(
    io: S,
    remote: impl Into<String>,
    dispatcher: &Dispatcher,
    config: &ConnConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = Connection::new(io, remote, config);
    let outcome = conn.run(dispatcher).await;
    conn.close().await;
    outcome
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(io: S, remote: impl Into<String>, config: &ConnConfig) -> Self {
        Self {
            stream: FrameStream::new(io, config),
            remote: remote.into(),
            state: ConnState::Upgrading,
            read: config.read,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnState { self.state }

    #[must_use]
    pub fn remote(&self) -> &str { &self.remote }

    /// Upgrades the stream and serves frames until the session ends, leaving
    /// the connection in [`ConnState::Closing`].
    pub async fn run(&mut self, dispatcher: &Dispatcher) -> Result<()> {
        if self.state != ConnState::Upgrading {
            return Err(Error::Closed);
        }
        tracing::info!(peer = %self.remote, "received request");

        if let Err(e) = self.stream.accept_upgrade().await {
            tracing::warn!(peer = %self.remote, error = %e, "upgrade failed");
            self.state = ConnState::Closing;
            return Err(e.into());
        }
        self.state = ConnState::Active;
        tracing::info!(peer = %self.remote, mode = %dispatcher.mode(), "upgraded to websocket");

        let outcome = self.serve(dispatcher).await;
        self.state = ConnState::Closing;
        outcome
    }

    async fn serve(&mut self, dispatcher: &Dispatcher) -> Result<()> {
        loop {
            let raw = match self.stream.read_frame().await? {
                ReadOutcome::Frame(raw) => raw,
                ReadOutcome::PollMiss => {
                    if let ReadStrategy::IdlePoll(delay) = self.read {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
            };
            let frame = raw.unmask();
            tracing::debug!(opcode = ?frame.opcode, len = frame.len(), "frame received");

            match dispatcher.route(frame).await {
                Action::Reply(response) => {
                    if let Err(e) = self.stream.write_frame(&response).await {
                        tracing::warn!(error = %e, "could not write to websocket");
                        return Err(e.into());
                    }
                    tracing::debug!(
                        opcode = ?response.opcode,
                        len = response.len(),
                        "sent response"
                    );
                }
                Action::Drop => tracing::trace!("empty frame dropped"),
                Action::Close => {
                    tracing::info!(peer = %self.remote, "received close command");
                    return Ok(());
                }
                Action::Reject(opcode) => {
                    tracing::warn!(opcode = ?opcode, "unsupported frame");
                    return Err(Error::UnsupportedOpcode(opcode));
                }
            }
        }
    }

    /// Shuts the stream down. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state == ConnState::Closed {
            return;
        }
        self.state = ConnState::Closed;
        tracing::info!(peer = %self.remote, "closing connection");
        if let Err(e) = self.stream.shutdown().await {
            tracing::warn!(peer = %self.remote, error = %e, "could not close connection");
        }
    }
}
