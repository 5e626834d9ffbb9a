//! # Configuration
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. `memlink.toml` (or the file given with `--config`)
//! 2. Environment variables (`MEMLINK_ENDPOINT`, `MEMLINK_KEY_FILE`,
//!    `MEMLINK_STORE`, `MEMLINK_GRAPH`)
//! 3. Command-line flags
//!
//! Every field has a default, so an empty or missing file is valid.

use memlink_core::{MemlinkError, SessionParams};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no `--config` is given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "memlink.toml";

pub const ENV_ENDPOINT: &str = "MEMLINK_ENDPOINT";
pub const ENV_KEY_FILE: &str = "MEMLINK_KEY_FILE";
pub const ENV_STORE: &str = "MEMLINK_STORE";
pub const ENV_GRAPH: &str = "MEMLINK_GRAPH";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub peer: PeerConfig,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeerConfig {
    /// `host:port` of the relationship peer.
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    /// 0 disables the timeout.
    pub read_timeout_ms: u64,
    /// 0 disables the timeout.
    pub write_timeout_ms: u64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:8080".to_string(),
            connect_timeout_ms: 5_000,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
        }
    }
}

impl PeerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Key/value store file.
    pub store_path: PathBuf,
    /// Graph snapshot file.
    pub graph_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("memlink.kv"),
            graph_path: PathBuf::from("memlink.graph"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptoConfig {
    /// PEM file holding the peer's public key (or a private key to derive it from).
    pub key_file: Option<PathBuf>,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, MemlinkError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| MemlinkError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MemlinkError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MemlinkError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Load the file layer.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// read if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, MemlinkError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(endpoint) = var(ENV_ENDPOINT) {
            self.peer.endpoint = endpoint;
        }
        if let Some(key_file) = var(ENV_KEY_FILE) {
            self.crypto.key_file = Some(PathBuf::from(key_file));
        }
        if let Some(store) = var(ENV_STORE) {
            self.storage.store_path = PathBuf::from(store);
        }
        if let Some(graph) = var(ENV_GRAPH) {
            self.storage.graph_path = PathBuf::from(graph);
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), MemlinkError> {
        if self.peer.endpoint.trim().is_empty() {
            return Err(MemlinkError::Config(
                "peer.endpoint must not be empty".into(),
            ));
        }
        if self.peer.connect_timeout_ms == 0 {
            return Err(MemlinkError::Config(
                "peer.connect_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.storage.store_path.as_os_str().is_empty() {
            return Err(MemlinkError::Config(
                "storage.store_path must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Session parameters; requires a key file.
    pub fn session_params(&self) -> Result<SessionParams, MemlinkError> {
        let key_file = self.crypto.key_file.clone().ok_or_else(|| {
            MemlinkError::Config(format!(
                "No key file configured (set crypto.key_file, {} or --key-file)",
                ENV_KEY_FILE
            ))
        })?;
        Ok(SessionParams::new(
            self.peer.endpoint.clone(),
            key_file,
            self.storage.store_path.clone(),
        )
        .with_graph_path(self.storage.graph_path.clone()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.peer.endpoint, "127.0.0.1:8080");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [peer]
            endpoint = "10.0.0.2:9000"
            read_timeout_ms = 0

            [crypto]
            key_file = "peer.pem"
            "#,
        )
        .expect("parse");

        assert_eq!(config.peer.endpoint, "10.0.0.2:9000");
        assert_eq!(config.peer.read_timeout(), None);
        assert_eq!(config.peer.connect_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.storage, StorageConfig::default());
        assert_eq!(config.crypto.key_file, Some(PathBuf::from("peer.pem")));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            Config::from_toml("[peer]\nendpoit = \"x\"\n"),
            Err(MemlinkError::Config(_))
        ));
    }

    #[test]
    fn zero_connect_timeout_rejected() {
        assert!(Config::from_toml("[peer]\nconnect_timeout_ms = 0\n").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::from_toml("[storage]\nstore_path = \"file.kv\"\n").expect("parse");
        let env: HashMap<&str, &str> = [
            (ENV_STORE, "env.kv"),
            (ENV_ENDPOINT, "peer:1"),
            (ENV_GRAPH, ""),
        ]
        .into_iter()
        .collect();

        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.storage.store_path, PathBuf::from("env.kv"));
        assert_eq!(config.peer.endpoint, "peer:1");
        assert_eq!(config.storage.graph_path, PathBuf::from("memlink.graph"));
    }

    #[test]
    fn session_params_need_key_file() {
        let mut config = Config::default();
        assert!(matches!(
            config.session_params(),
            Err(MemlinkError::Config(_))
        ));

        config.crypto.key_file = Some(PathBuf::from("peer.pem"));
        let params = config.session_params().expect("params");
        assert_eq!(params.graph_path, Some(PathBuf::from("memlink.graph")));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
