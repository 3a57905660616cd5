//! Error types for the tunnel and build session

use http::{HeaderMap, StatusCode};
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while tunneling to the engine or driving a build
#[derive(Debug, Error)]
pub enum Error {
    /// The engine address could not be parsed into a dialable transport
    #[error("invalid engine address: {0}")]
    InvalidAddress(String),

    /// The build context or description file can't be used
    #[error("invalid build context: {0}")]
    InvalidContext(String),

    /// Dialing the engine failed before any HTTP exchange
    #[error("failed to dial engine: {0}")]
    Dial(#[source] std::io::Error),

    /// The engine refused the h2c upgrade
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    /// The local gRPC transport could not be set up
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// An RPC finished with a non-OK status
    #[error("{rpc} failed: {}", .status.message())]
    Rpc {
        rpc: &'static str,
        #[source]
        status: tonic::Status,
    },

    /// A participant was interrupted before finishing its exchange
    #[error("{0} was interrupted")]
    Interrupted(&'static str),

    /// The engine broke the expected exchange shape; fatal for the build
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Combined error of every failure recorded during one build
    #[error("build {build_id} failed: {}", summarize(.errors))]
    Build { build_id: String, errors: Vec<Error> },

    #[error("invalid metadata value: {0}")]
    InvalidMetadata(#[from] tonic::metadata::errors::InvalidMetadataValue),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn rpc(rpc: &'static str, status: tonic::Status) -> Self {
        Error::Rpc { rpc, status }
    }

    /// Short, stable name of the error category
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAddress(_) => "invalid-address",
            Error::InvalidContext(_) => "invalid-context",
            Error::Dial(_) => "dial",
            Error::Upgrade(_) => "upgrade",
            Error::Transport(_) => "transport",
            Error::Rpc { .. } => "rpc",
            Error::Interrupted(_) => "interrupted",
            Error::Protocol(_) => "protocol",
            Error::Build { .. } => "build",
            Error::InvalidMetadata(_) => "invalid-metadata",
            Error::Io(_) => "io",
        }
    }

    /// Errors collected by a failed build, empty for any other variant
    pub fn recorded(&self) -> &[Error] {
        match self {
            Error::Build { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn summarize(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.kind(), e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Diagnostic for a rejected h2c upgrade
///
/// Carries the HTTP status line, headers and body the engine answered with, so the
/// failure can be attributed to the single pairing it affected.
#[derive(Debug, Error)]
#[error("h2c upgrade rejected with {status}: {}", String::from_utf8_lossy(.body).trim())]
pub struct UpgradeError {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}
