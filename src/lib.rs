//! BuildKit tunnel client
//!
//! Drives a container engine's embedded BuildKit through the engine's single HTTP
//! endpoint. A local relay upgrades fresh engine connections to h2c and carries
//! every gRPC stream across them, so tonic clients can talk to the build API as if
//! it were a plain HTTP/2 server.
//!
//! # Features
//!
//! - h2c upgrade tunnel over TCP, Unix socket or Windows named pipe
//! - Concurrent status, control and gateway exchanges per build
//! - Capability negotiation with the Dockerfile frontend
//! - One combined error for every failure recorded during a build
//!
//! # Examples
//!
//! ```no_run
//! use buildkit_tunnel::{EngineConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = Session::connect(&EngineConfig::from_env()).await?;
//!
//!     let build = session.create_build("./my-app", "Dockerfile");
//!     let result = build.run().await?;
//!
//!     for (key, value) in &result {
//!         println!("{key}: {value}");
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod collector;
pub mod config;
pub mod error;
pub mod proto;
pub mod session;
pub mod solve;
pub mod vcs;

// Re-export main types
pub use builder::BuildConfig;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use session::{GrpcTransport, Session};
pub use solve::Build;
