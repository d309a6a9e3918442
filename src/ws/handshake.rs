use std::collections::HashMap;

use base64::engine::{Engine, general_purpose::STANDARD as BASE64};
use bytes::BytesMut;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::UpgradeError;

type Result<T> = std::result::Result<T, UpgradeError>;

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const MAX_HEAD: usize = 8 * 1024;

/// `Sec-WebSocket-Accept` value for a client's `Sec-WebSocket-Key`.
#[must_use]
pub fn accept_key(key: &str) -> String {
    let mut sha = Sha1::new();
    sha.update(key.as_bytes());
    sha.update(GUID.as_bytes());
    BASE64.encode(sha.finalize())
}

/// Server half of the upgrade.
///
/// Reads the request head into `buf`; anything the client sent after the head
/// is left in `buf` for the frame decoder. Invalid requests get a best-effort
/// `400 Bad Request` before the error is returned.
pub(crate) async fn accept<S>(io: &mut S, buf: &mut BytesMut) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = read_head(io, buf).await?;
    let key = match validate_request(&head) {
        Ok(key) => key,
        Err(e) => {
            let _ = io
                .write_all(
                    b"HTTP/1.1 400 Bad Request\r\n\
                      Sec-WebSocket-Version: 13\r\n\
                      Content-Length: 0\r\n\r\n",
                )
                .await;
            return Err(e);
        }
    };

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(&key)
    );
    io.write_all(response.as_bytes())
        .await
        .map_err(UpgradeError::Write)?;
    io.flush().await.map_err(UpgradeError::Write)
}

/// Client half of the upgrade. Bytes following the response head stay in `buf`.
pub(crate) async fn connect<S>(io: &mut S, host: &str, path: &str, buf: &mut BytesMut) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let sec_websocket_key = {
        let mut key_bytes = [0u8; 16];
        rand::fill(&mut key_bytes);
        BASE64.encode(key_bytes)
    };

    let req = format!(
        "GET {path} HTTP/1.1\r\n\
        Host: {host}\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: {sec_websocket_key}\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n",
    );
    io.write_all(req.as_bytes())
        .await
        .map_err(UpgradeError::Write)?;
    io.flush().await.map_err(UpgradeError::Write)?;

    let head = read_head(io, buf).await?;
    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();
    let mut status_parts = status_line.split_whitespace();
    if status_parts.next().is_none() || status_parts.next() != Some("101") {
        return Err(UpgradeError::StatusLine(status_line.to_owned()));
    }

    let headers = parse_headers(lines);
    validate_token(&headers, "upgrade", "Upgrade", "websocket")?;
    validate_token(&headers, "connection", "Connection", "upgrade")?;

    let expected = accept_key(&sec_websocket_key);
    match headers.get("sec-websocket-accept") {
        Some(got) if *got == expected => Ok(()),
        got => Err(UpgradeError::Header {
            field: "Sec-WebSocket-Accept",
            expected,
            got: got.cloned(),
        }),
    }
}

// Reads until the blank line ending an HTTP head and splits the head off `buf`.
async fn read_head<S: AsyncRead + Unpin>(io: &mut S, buf: &mut BytesMut) -> Result<String> {
    let mut searched = 0;
    loop {
        if let Some(pos) = buf[searched..].windows(4).position(|w| w == b"\r\n\r\n") {
            let head = buf.split_to(searched + pos + 4);
            return Ok(String::from_utf8_lossy(&head).into_owned());
        }
        if buf.len() > MAX_HEAD {
            return Err(UpgradeError::TooLarge(MAX_HEAD));
        }
        // resume a little before the old end, the terminator may straddle reads
        searched = buf.len().saturating_sub(3);
        buf.reserve(1024);
        if io.read_buf(buf).await.map_err(UpgradeError::Read)? == 0 {
            return Err(UpgradeError::Truncated);
        }
    }
}

// Returns the Sec-WebSocket-Key of a valid upgrade request.
fn validate_request(head: &str) -> Result<String> {
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("GET"), Some(_path), Some("HTTP/1.1")) => {}
        _ => return Err(UpgradeError::RequestLine(request_line.to_owned())),
    }

    let headers = parse_headers(lines);
    validate_token(&headers, "upgrade", "Upgrade", "websocket")?;
    validate_token(&headers, "connection", "Connection", "upgrade")?;
    match headers.get("sec-websocket-version").map(String::as_str) {
        Some("13") => {}
        got => {
            return Err(UpgradeError::Header {
                field: "Sec-WebSocket-Version",
                expected: "13".into(),
                got: got.map(str::to_owned),
            });
        }
    }
    headers
        .get("sec-websocket-key")
        .filter(|k| !k.is_empty())
        .cloned()
        .ok_or(UpgradeError::MissingHeader("Sec-WebSocket-Key"))
}

// collect headers in a hashmap, names lowercased
fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_owned()))
        .collect()
}

// Header must be present and list `token` among its comma-separated values.
fn validate_token(
    headers: &HashMap<String, String>,
    key: &str,
    field: &'static str,
    token: &str,
) -> Result<()> {
    match headers.get(key) {
        Some(v) if v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)) => Ok(()),
        Some(v) => Err(UpgradeError::Header {
            field,
            expected: token.into(),
            got: Some(v.clone()),
        }),
        None => Err(UpgradeError::MissingHeader(field)),
    }
}
