//! Engine dialers
//!
//! The relay only knows how to "dial the server". Which byte channel that is (TCP,
//! Unix socket or Windows named pipe) is decided here from the engine address.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Result};

/// Byte channel to the engine
pub trait EngineIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> EngineIo for T {}

/// Opens fresh connections to the engine's HTTP endpoint
#[tonic::async_trait]
pub trait Dialer: Send + Sync + fmt::Debug {
    /// Open a new byte channel to the engine
    async fn dial(&self) -> io::Result<Box<dyn EngineIo>>;

    /// Value for the `Host` header of the upgrade request
    fn host(&self) -> String;
}

/// Dials the engine over TCP
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
}

impl TcpDialer {
    /// Create a dialer for `host:port`
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[tonic::async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self) -> io::Result<Box<dyn EngineIo>> {
        let stream = tokio::net::TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn host(&self) -> String {
        self.addr.clone()
    }
}

/// Dials the engine over a Unix domain socket
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct UnixDialer {
    path: std::path::PathBuf,
}

#[cfg(unix)]
impl UnixDialer {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(unix)]
#[tonic::async_trait]
impl Dialer for UnixDialer {
    async fn dial(&self) -> io::Result<Box<dyn EngineIo>> {
        let stream = tokio::net::UnixStream::connect(&self.path).await?;
        Ok(Box::new(stream))
    }

    fn host(&self) -> String {
        LOCAL_HOST.to_string()
    }
}

/// Dials the engine over a Windows named pipe
#[cfg(windows)]
#[derive(Debug, Clone)]
pub struct NamedPipeDialer {
    path: String,
}

#[cfg(windows)]
impl NamedPipeDialer {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(windows)]
#[tonic::async_trait]
impl Dialer for NamedPipeDialer {
    async fn dial(&self) -> io::Result<Box<dyn EngineIo>> {
        let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(&self.path)?;
        Ok(Box::new(pipe))
    }

    fn host(&self) -> String {
        LOCAL_HOST.to_string()
    }
}

/// Host header used for socket and pipe transports, which have no network name
#[cfg(any(unix, windows))]
const LOCAL_HOST: &str = "docker";

/// Pick a dialer for an engine address
///
/// Accepted forms are `tcp://host:port`, `http://host:port`, `unix:///path/to.sock`
/// and `npipe:////./pipe/name`.
pub fn dialer_for(address: &str) -> Result<Arc<dyn Dialer>> {
    let (scheme, rest) = address
        .split_once("://")
        .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;

    match scheme {
        "tcp" | "http" => {
            let authority = rest.trim_end_matches('/');
            if authority.is_empty() || !authority.contains(':') {
                return Err(Error::InvalidAddress(address.to_string()));
            }
            Ok(Arc::new(TcpDialer::new(authority)))
        }
        #[cfg(unix)]
        "unix" => {
            if rest.is_empty() {
                return Err(Error::InvalidAddress(address.to_string()));
            }
            Ok(Arc::new(UnixDialer::new(rest)))
        }
        #[cfg(windows)]
        "npipe" => Ok(Arc::new(NamedPipeDialer::new(rest.replace('/', "\\")))),
        _ => Err(Error::InvalidAddress(address.to_string())),
    }
}
