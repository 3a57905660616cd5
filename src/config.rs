//! Engine connection configuration

use std::env;
use std::sync::Arc;

use crate::error::Result;
use crate::session::dialer::{dialer_for, Dialer};
use crate::session::upgrade::DEFAULT_UPGRADE_PATH;

/// Environment variable holding the engine address
pub const HOST_ENV: &str = "DOCKER_HOST";

/// Environment variable overriding the h2c upgrade path
pub const UPGRADE_PATH_ENV: &str = "BUILDKIT_TUNNEL_UPGRADE_PATH";

#[cfg(unix)]
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";
#[cfg(windows)]
pub const DEFAULT_HOST: &str = "npipe:////./pipe/docker_engine";
#[cfg(not(any(unix, windows)))]
pub const DEFAULT_HOST: &str = "tcp://127.0.0.1:2375";

/// Where the engine lives and how to reach its build API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine address, e.g. `unix:///var/run/docker.sock` or `tcp://host:2375`
    pub host: String,
    /// HTTP path answering the h2c upgrade
    pub upgrade_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            upgrade_path: DEFAULT_UPGRADE_PATH.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration for an explicit engine address
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Read the configuration from `DOCKER_HOST` and `BUILDKIT_TUNNEL_UPGRADE_PATH`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup(HOST_ENV)
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.host),
            upgrade_path: lookup(UPGRADE_PATH_ENV)
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.upgrade_path),
        }
    }

    /// Set the upgrade path
    pub fn upgrade_path(mut self, path: impl Into<String>) -> Self {
        self.upgrade_path = path.into();
        self
    }

    /// Dialer for the configured address
    pub fn dialer(&self) -> Result<Arc<dyn Dialer>> {
        dialer_for(&self.host)
    }
}
