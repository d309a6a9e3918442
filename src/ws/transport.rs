use std::{
    future::poll_fn,
    io,
    pin::Pin,
    task::Poll,
    time::{Duration, Instant},
};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use super::handshake;
use crate::{
    config::{ConnConfig, ReadStrategy},
    error::{Error, Result, UpgradeError},
    frames::{Frame, FrameDecoder, FrameState, RawFrame},
};

const READ_CHUNK: usize = 16 * 1024;

#[derive(Debug)]
pub enum ReadOutcome {
    Frame(RawFrame),
    /// No complete frame is available yet. Only produced under
    /// [`ReadStrategy::IdlePoll`].
    PollMiss,
}

/// A byte stream paired with the frame decoder reading from it.
pub struct FrameStream<S> {
    io: S,
    decoder: FrameDecoder,
    scratch: Vec<u8>,
    read: ReadStrategy,
    read_timeout: Duration,
    last_data: Instant,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FrameStream<S> {
    pub fn new(io: S, config: &ConnConfig) -> Self {
        Self {
            io,
            decoder: FrameDecoder::new(config.max_payload),
            scratch: vec![0; READ_CHUNK],
            read: config.read,
            read_timeout: config.read_timeout,
            last_data: Instant::now(),
        }
    }

    /// Server side of the upgrade. The request must arrive within `read_timeout`.
    pub(crate) async fn accept_upgrade(&mut self) -> std::result::Result<(), UpgradeError> {
        let mut buf = BytesMut::new();
        tokio::time::timeout(self.read_timeout, handshake::accept(&mut self.io, &mut buf))
            .await
            .map_err(|_| UpgradeError::Timeout)??;
        self.decoder.push_bytes(&buf);
        self.last_data = Instant::now();
        Ok(())
    }

    pub(crate) async fn connect_upgrade(
        &mut self,
        host: &str,
        path: &str,
    ) -> std::result::Result<(), UpgradeError> {
        let mut buf = BytesMut::new();
        let upgrade = handshake::connect(&mut self.io, host, path, &mut buf);
        tokio::time::timeout(self.read_timeout, upgrade)
            .await
            .map_err(|_| UpgradeError::Timeout)??;
        self.decoder.push_bytes(&buf);
        self.last_data = Instant::now();
        Ok(())
    }

    /// Decodes the next frame, reading from the stream as needed.
    ///
    /// End of stream is [`Error::PeerClosed`]; going `read_timeout` without any
    /// data is [`Error::ReadTimeout`].
    pub async fn read_frame(&mut self) -> Result<ReadOutcome> {
        loop {
            if let FrameState::Complete(frame) = self.decoder.next_frame()? {
                return Ok(ReadOutcome::Frame(frame));
            }

            let n = match self.read {
                ReadStrategy::IdlePoll(_) => match self.try_read().await {
                    Some(n) => n?,
                    None if self.last_data.elapsed() >= self.read_timeout => {
                        return Err(Error::ReadTimeout(self.read_timeout));
                    }
                    None => return Ok(ReadOutcome::PollMiss),
                },
                ReadStrategy::Deadline => {
                    tokio::time::timeout(self.read_timeout, self.io.read(&mut self.scratch))
                        .await
                        .map_err(|_| Error::ReadTimeout(self.read_timeout))??
                }
            };
            if n == 0 {
                tracing::debug!("TCP FIN");
                return Err(Error::PeerClosed);
            }
            tracing::trace!(bytes = n, "read socket");
            self.last_data = Instant::now();
            self.decoder.push_bytes(&self.scratch[..n]);
        }
    }

    // Polls the stream once; `None` when no data is ready.
    async fn try_read(&mut self) -> Option<io::Result<usize>> {
        let io = &mut self.io;
        let mut buf = ReadBuf::new(&mut self.scratch);
        poll_fn(|cx| {
            Poll::Ready(match Pin::new(&mut *io).poll_read(cx, &mut buf) {
                Poll::Ready(Ok(())) => Some(Ok(buf.filled().len())),
                Poll::Ready(Err(e)) => Some(Err(e)),
                Poll::Pending => None,
            })
        })
        .await
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.write_raw(&frame.encode()).await
    }

    pub(crate) async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.io.write_all(bytes).await?;
        self.io.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> { self.io.shutdown().await }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;
    use crate::frames::{Opcode, encode_masked};

    fn config(read: ReadStrategy, read_timeout: Duration) -> ConnConfig {
        ConnConfig {
            read,
            read_timeout,
            ..ConnConfig::default()
        }
    }

    #[tokio::test]
    async fn idle_poll_misses_then_reads() {
        let (mut client, server) = duplex(1024);
        let cfg = config(
            ReadStrategy::IdlePoll(Duration::from_millis(10)),
            Duration::from_secs(5),
        );
        let mut stream = FrameStream::new(server, &cfg);

        assert!(matches!(stream.read_frame().await, Ok(ReadOutcome::PollMiss)));

        client
            .write_all(&encode_masked(Opcode::Text, b"hi", [1, 2, 3, 4]))
            .await
            .unwrap();
        let Ok(ReadOutcome::Frame(raw)) = stream.read_frame().await else {
            panic!("expected a frame");
        };
        assert_eq!(&raw.unmask().payload[..], b"hi");
    }

    #[tokio::test]
    async fn idle_poll_times_out() {
        let (_client, server) = duplex(1024);
        let cfg = config(ReadStrategy::IdlePoll(Duration::from_millis(1)), Duration::ZERO);
        let mut stream = FrameStream::new(server, &cfg);
        assert!(matches!(stream.read_frame().await, Err(Error::ReadTimeout(_))));
    }

    #[tokio::test]
    async fn deadline_blocks_until_data() {
        let (mut client, server) = duplex(1024);
        let cfg = config(ReadStrategy::Deadline, Duration::from_secs(5));
        let mut stream = FrameStream::new(server, &cfg);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            client
                .write_all(&encode_masked(Opcode::Bin, &[1, 2, 3], [9, 9, 9, 9]))
                .await
                .unwrap();
            // keep the stream open until the frame has been read
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
        let Ok(ReadOutcome::Frame(raw)) = stream.read_frame().await else {
            panic!("expected a frame");
        };
        assert_eq!(&raw.unmask().payload[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn deadline_times_out() {
        let (_client, server) = duplex(1024);
        let cfg = config(ReadStrategy::Deadline, Duration::from_millis(20));
        let mut stream = FrameStream::new(server, &cfg);
        assert!(matches!(stream.read_frame().await, Err(Error::ReadTimeout(_))));
    }

    #[tokio::test]
    async fn eof_is_peer_closed() {
        let (client, server) = duplex(1024);
        drop(client);
        let cfg = config(ReadStrategy::Deadline, Duration::from_secs(1));
        let mut stream = FrameStream::new(server, &cfg);
        assert!(matches!(stream.read_frame().await, Err(Error::PeerClosed)));
    }
}
