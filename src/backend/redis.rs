use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream},
    net::TcpStream,
    sync::Mutex,
};

use crate::{MAX_FRAME_PAYLOAD, error::BackendError, protocol::KvBackend};

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis backend speaking RESP2 over a single lazily opened connection.
///
/// Requests are serialised through a tokio mutex, which makes one instance
/// safe to share between connection tasks. A connection that fails mid-request
/// is dropped and reopened on the next call.
pub struct RedisBackend {
    addr: String,
    timeout: Duration,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
}

impl RedisBackend {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    /// Accepts `redis://host[:port]`.
    pub fn from_url(url: &str) -> Result<Self, BackendError> {
        let parsed =
            url::Url::parse(url).map_err(|e| BackendError::Protocol(format!("{url}: {e}")))?;
        if parsed.scheme() != "redis" {
            return Err(BackendError::Protocol(format!("{url}: expected redis://")));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| BackendError::Protocol(format!("{url}: missing host")))?;
        let port = parsed.port().unwrap_or(DEFAULT_PORT);
        Ok(Self::new(format!("{host}:{port}")))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn addr(&self) -> &str { &self.addr }

    async fn request(&self, args: &[&str]) -> Result<Reply, BackendError> {
        let mut slot = self.conn.lock().await;
        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => {
                let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
                    .await
                    .map_err(|_| BackendError::Timeout(self.timeout))??;
                tracing::debug!(addr = %self.addr, "connected to redis");
                BufStream::new(stream)
            }
        };

        let reply = tokio::time::timeout(self.timeout, exchange(&mut conn, args))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;
        *slot = Some(conn);
        Ok(reply)
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        match self.request(&["GET", key]).await? {
            Reply::Bulk(Some(v)) => Ok(Some(String::from_utf8_lossy(&v).into_owned())),
            Reply::Bulk(None) => Ok(None),
            Reply::Error(e) => Err(BackendError::Rejected(e)),
            other => Err(BackendError::Protocol(format!("unexpected GET reply {other:?}"))),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        let millis = ttl.as_millis().max(1).to_string();
        match self.request(&["SET", key, value, "PX", &millis]).await? {
            Reply::Simple(s) if s == "OK" => Ok(()),
            Reply::Error(e) => Err(BackendError::Rejected(e)),
            other => Err(BackendError::Protocol(format!("unexpected SET reply {other:?}"))),
        }
    }
}

async fn exchange(conn: &mut BufStream<TcpStream>, args: &[&str]) -> Result<Reply, BackendError> {
    conn.write_all(&encode_request(args)).await?;
    conn.flush().await?;
    read_reply(conn).await
}

// *<n>\r\n followed by one bulk string per argument
fn encode_request(args: &[&str]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.put_slice(arg.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf
}

async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Reply, BackendError> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await? == 0 {
        return Err(BackendError::Protocol("connection closed".into()));
    }
    let Some(line) = line.strip_suffix(b"\r\n") else {
        return Err(BackendError::Protocol("reply not terminated by CRLF".into()));
    };
    let Some((&kind, rest)) = line.split_first() else {
        return Err(BackendError::Protocol("empty reply".into()));
    };
    let rest = String::from_utf8_lossy(rest).into_owned();

    match kind {
        b'+' => Ok(Reply::Simple(rest)),
        b'-' => Ok(Reply::Error(rest)),
        b':' => parse_int(&rest).map(Reply::Integer),
        b'$' => {
            let len = parse_int(&rest)?;
            let Ok(len) = usize::try_from(len) else {
                return Ok(Reply::Bulk(None));
            };
            // a value longer than one frame could never be sent back to the client
            if len > MAX_FRAME_PAYLOAD {
                return Err(BackendError::Protocol(format!("bulk string of {len} bytes")));
            }
            let mut data = vec![0; len + 2];
            reader.read_exact(&mut data).await?;
            if !data.ends_with(b"\r\n") {
                return Err(BackendError::Protocol("bulk string not terminated".into()));
            }
            data.truncate(len);
            Ok(Reply::Bulk(Some(data)))
        }
        other => Err(BackendError::Protocol(format!(
            "unsupported reply type {:?}",
            char::from(other)
        ))),
    }
}

fn parse_int(s: &str) -> Result<i64, BackendError> {
    s.parse()
        .map_err(|_| BackendError::Protocol(format!("invalid integer {s:?}")))
}
