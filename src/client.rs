use std::{io, net::SocketAddr, time::Duration};

use tokio::net::TcpStream;

use crate::{
    config::{ConnConfig, ReadStrategy},
    error::{Error, UpgradeError},
    frames::{Frame, Opcode, encode_masked},
    ws::{FrameStream, ReadOutcome},
};

type Result<T> = std::result::Result<T, UpgradeError>;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal client: upgrades a TCP connection and exchanges single frames.
pub struct BridgeClient {
    stream: FrameStream<TcpStream>,
    addr: SocketAddr,
}

impl BridgeClient {
    /// Attempts to connect to `ws://host[:port][/path]` and upgrade the connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|_| UpgradeError::InvalidUrl(url.into()))?;
        if parsed.scheme() != "ws" {
            return Err(UpgradeError::InvalidUrl(url.into()));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| UpgradeError::InvalidUrl(url.into()))?;
        let port = parsed.port_or_known_default().unwrap_or(80);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(UpgradeError::Connect)?;
        let addr = stream.peer_addr().map_err(UpgradeError::Connect)?;

        let config = ConnConfig {
            read: ReadStrategy::Deadline,
            read_timeout: RECV_TIMEOUT,
            ..ConnConfig::default()
        };
        let mut stream = FrameStream::new(stream, &config);
        let host_header = format!("{host}:{port}");
        stream.connect_upgrade(&host_header, parsed.path()).await?;

        tracing::info!(addr = ?addr, "successfully connected to peer");
        Ok(Self { stream, addr })
    }

    /// Attempts to connect and upgrade, with timeout.
    pub async fn connect_timeout(url: &str, timeout: Duration) -> Result<Self> {
        match tokio::time::timeout(timeout, Self::connect(url)).await {
            Ok(res) => res,
            Err(_) => Err(UpgradeError::Timeout),
        }
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Sends one masked frame.
    pub async fn send(&mut self, opcode: Opcode, payload: &[u8]) -> io::Result<()> {
        let mut mask_key = [0u8; 4];
        rand::fill(&mut mask_key);
        self.stream
            .write_raw(&encode_masked(opcode, payload, mask_key))
            .await
    }

    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send(Opcode::Text, text.as_bytes()).await
    }

    pub async fn send_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.send(Opcode::Bin, bytes).await
    }

    /// Waits for the next frame. [`Error::PeerClosed`] once the server hangs up.
    pub async fn recv(&mut self) -> std::result::Result<Frame, Error> {
        loop {
            if let ReadOutcome::Frame(raw) = self.stream.read_frame().await? {
                return Ok(raw.unmask());
            }
        }
    }

    pub async fn close(mut self) -> io::Result<()> { self.stream.shutdown().await }
}
