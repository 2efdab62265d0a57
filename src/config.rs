// Copyright (c) 2026 Veltaros
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Node configuration: loaded once from TOML at startup, validated, then
//! wrapped in an `Arc` and treated as immutable for the rest of the
//! process lifetime.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration load/validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Read(String),
    /// The file did not parse as valid TOML in the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A required field was missing or out of its documented range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_dial_timeout_secs() -> u64 {
    7
}

fn default_handshake_timeout_secs() -> u64 {
    7
}

fn default_max_peers() -> u32 {
    64
}

fn default_api_timeout_secs() -> u64 {
    30
}

/// `network.*` options.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    /// Local TCP listen address.
    pub listen: String,
    /// Externally reachable address advertised to peers, if different.
    #[serde(default)]
    pub external: Option<String>,
    /// Bootstrap peer addresses.
    #[serde(default)]
    pub bootstrap: Vec<String>,
    /// Maximum concurrently registered peers, `1..=4096`.
    #[serde(default = "default_max_peers")]
    pub max_peers: u32,
    /// Per-dial timeout, seconds.
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout: u64,
    /// Per-handshake timeout, seconds.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout: u64,
    /// Network identifier; required, non-empty.
    pub id: String,
}

impl NetworkConfig {
    /// `dial_timeout` as a [`Duration`].
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout)
    }

    /// `handshake_timeout` as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }
}

/// `paths.*` options: every on-disk file this node reads or writes.
#[derive(Clone, Debug, Deserialize)]
pub struct PathsConfig {
    /// `identity.key`.
    pub identity_key: String,
    /// `identity.json`.
    pub identity_record: String,
    /// `banlist.json`.
    pub banlist: String,
    /// `peers.json`.
    pub peer_store: String,
    /// `scores.json`.
    pub score_store: String,
    /// `nonces.json`.
    pub nonces: String,
    /// `ledger.json`.
    pub ledger: String,
    /// `blocks.json`.
    pub blocks: String,
    /// Base data directory (informational; individual paths are explicit).
    pub data_dir: String,
}

/// `api.*` options, consumed by the HTTP collaborator only.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Read timeout, seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub read_timeout: u64,
    /// Write timeout, seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub write_timeout: u64,
    /// Idle keep-alive timeout, seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub idle_timeout: u64,
}

/// Structured-log level.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operational messages.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures an operator should act on.
    Error,
}

/// Structured-log output format.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable compact text.
    Text,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

/// `log.*` options.
#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    /// Minimum level emitted.
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    /// Output encoding.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Root node configuration, as loaded from TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    /// P2P networking options.
    pub network: NetworkConfig,
    /// On-disk file locations.
    pub paths: PathsConfig,
    /// HTTP collaborator options.
    pub api: ApiConfig,
    /// Structured logging options.
    #[serde(default)]
    pub log: LogConfig,
    /// Enables the dev-only confirm-block and faucet endpoints.
    #[serde(default)]
    pub dev_mode: bool,
}

impl NodeConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file from disk.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    /// Validate fields the parser cannot express as types: required
    /// non-emptiness and documented numeric ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.id.trim().is_empty() {
            return Err(ConfigError::Invalid("network.id must be non-empty".to_string()));
        }
        if !(1..=4096).contains(&self.network.max_peers) {
            return Err(ConfigError::Invalid("network.max_peers must be in 1..=4096".to_string()));
        }
        if self.network.listen.trim().is_empty() {
            return Err(ConfigError::Invalid("network.listen must be non-empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
        [network]
        listen = "0.0.0.0:30303"
        bootstrap = ["1.2.3.4:30303"]
        max_peers = 32
        id = "veltaros-testnet"

        [paths]
        identity_key = "./data/identity.key"
        identity_record = "./data/identity.json"
        banlist = "./data/banlist.json"
        peer_store = "./data/peers.json"
        score_store = "./data/scores.json"
        nonces = "./data/nonces.json"
        ledger = "./data/ledger.json"
        blocks = "./data/blocks.json"
        data_dir = "./data"

        [api]
        listen = "127.0.0.1:8080"

        [log]
        level = "info"
        format = "text"

        dev_mode = true
        "#
    }

    #[test]
    fn parses_a_well_formed_config() {
        let cfg = NodeConfig::from_toml_str(sample_toml()).unwrap();
        assert_eq!(cfg.network.id, "veltaros-testnet");
        assert_eq!(cfg.network.max_peers, 32);
        assert!(cfg.dev_mode);
        assert_eq!(cfg.log.level, LogLevel::Info);
    }

    #[test]
    fn rejects_empty_network_id() {
        let toml_str = sample_toml().replace(r#"id = "veltaros-testnet""#, r#"id = """#);
        let err = NodeConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_max_peers_out_of_range() {
        let toml_str = sample_toml().replace("max_peers = 32", "max_peers = 5000");
        let err = NodeConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn defaults_apply_when_log_section_is_omitted() {
        let toml_str = sample_toml().replace(
            r#"[log]
        level = "info"
        format = "text"
        "#,
            "",
        );
        let cfg = NodeConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(cfg.log.level, LogLevel::Info);
        assert_eq!(cfg.log.format, LogFormat::Text);
    }
}
