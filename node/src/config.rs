//! Sync configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use hummingbird_types::Height;

use crate::SyncError;

/// Node RPC endpoint settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// `host[:port]` or full URL. The port defaults to 8332.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Peer settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Endpoint the polling peer watches.
    #[serde(default = "default_host")]
    pub host: String,

    /// How often the polling peer checks for new blocks and mempool entries.
    #[serde(default = "default_peer_poll_ms")]
    pub poll_interval_ms: u64,
}

/// Configuration for a sync instance.
///
/// Can be loaded from a TOML file via [`SyncConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Balancers are not part of the
/// file; they are supplied in code when the instance is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reconnect immediately whenever the instance disconnects.
    #[serde(default)]
    pub reconnect: bool,

    /// Checkpoint file.
    #[serde(default = "default_tape")]
    pub tape: PathBuf,

    /// First height crawled when the checkpoint file is empty.
    #[serde(default)]
    pub start_height: Height,

    /// Delay between crawl iterations and between retries of failed calls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay between connection attempts while CONNECTING.
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub peer: PeerConfig,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "http://127.0.0.1:8332".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_peer_poll_ms() -> u64 {
    1000
}

fn default_tape() -> PathBuf {
    PathBuf::from(hummingbird_tape::DEFAULT_TAPE_PATH)
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_connect_retry_ms() -> u64 {
    1000
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, SyncError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SyncError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, SyncError> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: None,
            pass: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            poll_interval_ms: default_peer_poll_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect: false,
            tape: default_tape(),
            start_height: 0,
            poll_interval_ms: default_poll_interval_ms(),
            connect_retry_ms: default_connect_retry_ms(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            rpc: RpcConfig::default(),
            peer: PeerConfig::default(),
        }
    }
}
