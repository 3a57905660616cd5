//! HTTP/1.1 to h2c upgrade handshake
//!
//! The engine exposes a single HTTP endpoint. A `POST` to its upgrade path with
//! `Connection: Upgrade` and `Upgrade: h2c` switches the connection to cleartext
//! HTTP/2, after which the engine expects the client connection preface and serves
//! gRPC on the same socket.

use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use bytes::{Buf, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING, UPGRADE};
use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::error::{Error, Result, UpgradeError};

/// Default upgrade path served by the engine
pub const DEFAULT_UPGRADE_PATH: &str = "/grpc";

/// Upper bound for the response head
const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Upper bound for a diagnostic body read from a rejected upgrade
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Build the upgrade request sent to the engine
pub fn upgrade_request(host: &str, path: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: buildkit-tunnel/{version}\r\n\
         Content-Length: 0\r\n\
         Connection: Upgrade\r\n\
         Upgrade: h2c\r\n\
         \r\n",
        version = env!("CARGO_PKG_VERSION"),
    )
}

/// Parsed HTTP/1.1 response head
#[derive(Debug)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Length of the head including the terminating blank line
    pub len: usize,
}

/// Parse a response head from the start of `buf`
///
/// Returns `Ok(None)` while the blank line terminating the head has not arrived yet.
pub fn parse_response_head(buf: &[u8]) -> Result<Option<ResponseHead>> {
    let end = match buf.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => pos + 4,
        None => return Ok(None),
    };

    let head = std::str::from_utf8(&buf[..end - 4])
        .map_err(|_| Error::Protocol("upgrade response head is not valid UTF-8".to_string()))?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(Error::Protocol(format!(
            "unexpected upgrade response status line: {status_line}"
        )));
    }
    let status = parts
        .next()
        .and_then(|code| StatusCode::from_bytes(code.as_bytes()).ok())
        .ok_or_else(|| {
            Error::Protocol(format!("unexpected upgrade response status line: {status_line}"))
        })?;

    let mut headers = HeaderMap::new();
    for line in lines.filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Protocol(format!("malformed header line: {line}")))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| Error::Protocol(format!("malformed header name: {name}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| Error::Protocol(format!("malformed header value for {name}")))?;
        headers.append(name, value);
    }

    Ok(Some(ResponseHead {
        status,
        headers,
        len: end,
    }))
}

/// Perform the upgrade on a freshly dialed connection
///
/// On success the returned stream replays any HTTP/2 bytes the engine sent right
/// after the `101` head and is ready for the HTTP/2 client handshake.
pub async fn upgrade<IO>(mut io: IO, host: &str, path: &str) -> Result<Rewind<IO>>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    io.write_all(upgrade_request(host, path).as_bytes()).await?;
    io.flush().await?;

    let mut buf = BytesMut::with_capacity(1024);
    let head = loop {
        if let Some(head) = parse_response_head(&buf)? {
            break head;
        }
        if buf.len() > MAX_HEAD_SIZE {
            return Err(Error::Protocol("upgrade response head too large".to_string()));
        }
        if io.read_buf(&mut buf).await? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "engine closed the connection during the h2c upgrade",
            )));
        }
    };
    buf.advance(head.len);

    if head.status != StatusCode::SWITCHING_PROTOCOLS {
        let body = read_body(&mut io, &head.headers, buf).await;
        return Err(UpgradeError {
            status: head.status,
            headers: head.headers,
            body,
        }
        .into());
    }

    match head.headers.get(UPGRADE).and_then(|v| v.to_str().ok()) {
        Some(proto) if !proto.eq_ignore_ascii_case("h2c") => {
            return Err(Error::Protocol(format!("engine upgraded to {proto} instead of h2c")));
        }
        _ => {}
    }

    tracing::debug!("h2c upgrade accepted ({} bytes of HTTP/2 already buffered)", buf.len());
    Ok(Rewind::new(buf.freeze(), io))
}

/// Read the diagnostic body of a rejected upgrade, best effort
async fn read_body<IO>(io: &mut IO, headers: &HeaderMap, mut buf: BytesMut) -> Vec<u8>
where
    IO: AsyncRead + Unpin,
{
    let content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let chunked = headers
        .get(TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));

    loop {
        let complete = match content_length {
            Some(len) => buf.len() >= len,
            None if chunked => buf.ends_with(b"0\r\n\r\n"),
            None => false,
        };
        if complete || buf.len() >= MAX_BODY_SIZE {
            break;
        }
        match io.read_buf(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }

    if let Some(len) = content_length {
        buf.truncate(len);
    }
    if chunked {
        decode_chunked(&buf)
    } else {
        buf.to_vec()
    }
}

fn decode_chunked(mut raw: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    while let Some(pos) = raw.windows(2).position(|w| w == b"\r\n") {
        let size = std::str::from_utf8(&raw[..pos])
            .ok()
            .and_then(|s| usize::from_str_radix(s.split(';').next().unwrap_or("").trim(), 16).ok());
        let Some(size) = size else { break };
        raw = &raw[pos + 2..];
        if size == 0 || raw.len() < size {
            body.extend_from_slice(&raw[..size.min(raw.len())]);
            break;
        }
        body.extend_from_slice(&raw[..size]);
        raw = raw.get(size + 2..).unwrap_or_default();
    }
    body
}

/// Connection that yields already-buffered bytes before reading from the socket
#[derive(Debug)]
pub struct Rewind<T> {
    prefix: Bytes,
    inner: T,
}

impl<T> Rewind<T> {
    pub fn new(prefix: Bytes, inner: T) -> Self {
        Self { prefix, inner }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Rewind<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.prefix.is_empty() {
            let n = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Rewind<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
