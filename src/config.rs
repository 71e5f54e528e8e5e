//! Runtime configuration: TOML file with CLI-flag overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{NetmondError, Result};
use crate::stats::sysfs::DEFAULT_SYSFS_ROOT;

/// Default well-known control socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/netmond.sock";
/// Default reporting interval.
const DEFAULT_INTERVAL_MS: u64 = 1000;
/// Default grace period before a quit-ignoring worker is killed.
const DEFAULT_REAP_GRACE_MS: u64 = 5000;
/// Default bound on the supervisor-side handshake read.
const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 2000;

/// Full runtime configuration for the supervisor and the workers it spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Well-known control socket path.
    pub socket_path: PathBuf,
    /// Interfaces to monitor, one worker each.
    pub interfaces: Vec<String>,
    /// Reporting interval in milliseconds.
    pub interval_ms: u64,
    /// Grace period in milliseconds before SIGKILL during reaping.
    pub reap_grace_ms: u64,
    /// Bound in milliseconds on the supervisor-side handshake read.
    pub handshake_timeout_ms: u64,
    /// Root of the sysfs-shaped statistics tree.
    pub sysfs_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            interfaces: Vec::new(),
            interval_ms: DEFAULT_INTERVAL_MS,
            reap_grace_ms: DEFAULT_REAP_GRACE_MS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NetmondError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|e| NetmondError::ConfigParse {
            context: "config read",
            details: e.to_string(),
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| NetmondError::ConfigParse {
            context: "config parse",
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the supervisor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(NetmondError::InvalidConfig {
                details: "interval_ms must be greater than zero".into(),
            });
        }
        if let Some(name) = self
            .interfaces
            .iter()
            .find(|name| name.is_empty() || name.contains(['/', '\n']))
        {
            return Err(NetmondError::InvalidConfig {
                details: format!("invalid interface name {name:?}"),
            });
        }
        Ok(())
    }

    /// Reporting interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reap grace period as a [`Duration`].
    #[must_use]
    pub fn reap_grace(&self) -> Duration {
        Duration::from_millis(self.reap_grace_ms)
    }

    /// Handshake read bound as a [`Duration`].
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
