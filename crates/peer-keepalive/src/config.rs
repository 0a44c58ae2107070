//! Keepalive configuration.
//!
//! Loaded from an optional YAML file, then overridden from the command line.
//! Durations use humantime notation (`30s`, `1m`, `5m`).
//!
//! ```yaml
//! supervisor:
//!   keepalive_interval: 1m
//!   backoff_seed: 1s
//!   connect_timeout: 1s
//!   ceiling:
//!     policy: hard
//!     max_retries: 10
//! peers:
//!   url: https://runfission.com/ipfs/peers
//!   transport_filter: /wss/
//! probe_timeout: 10s
//! status_port: 8080
//! ```

use crate::backoff::CeilingPolicy;
use crate::peer_list::PeerListConfig;
use crate::supervisor::SupervisorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default bound on a single TCP probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration rejected while loading or validating.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration of a keepalive run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Timing and retry policy
    pub supervisor: SupervisorSettings,
    /// Where the peer set comes from
    pub peers: PeerListConfig,
    /// Bound on a single TCP probe
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// Serve the status API on this port
    pub status_port: Option<u16>,
    /// Verbose logging for this crate
    pub debug: bool,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorSettings::default(),
            peers: PeerListConfig::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            status_port: None,
            debug: false,
        }
    }
}

impl KeepaliveConfig {
    /// Load a YAML config file.
    ///
    /// Not validated yet: command-line overrides still apply on top.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parse YAML config text.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Reject settings the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.supervisor;
        if settings.keepalive_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "keepalive_interval must be greater than zero".into(),
            ));
        }
        if settings.backoff_seed.is_zero() {
            return Err(ConfigError::Invalid(
                "backoff_seed must be greater than zero".into(),
            ));
        }
        if settings.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect_timeout must be greater than zero".into(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "probe_timeout must be greater than zero".into(),
            ));
        }
        if let CeilingPolicy::Soft { max_interval } = settings.ceiling {
            if max_interval < settings.backoff_seed {
                return Err(ConfigError::Invalid(format!(
                    "soft ceiling {} is below backoff seed {}",
                    humantime::format_duration(max_interval),
                    humantime::format_duration(settings.backoff_seed),
                )));
            }
        }
        if self.peers.addresses.is_empty() && self.peers.url.is_none() {
            return Err(ConfigError::Invalid(
                "no peer addresses and no peer list url configured".into(),
            ));
        }
        Ok(())
    }
}
