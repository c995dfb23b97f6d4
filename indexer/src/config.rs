//! # Indexer Configuration & Constants
//!
//! Wire constants for the vault view call live here, next to the defaults
//! for everything an operator can override. The optional TOML file only
//! carries what actually varies between deployments: which suffixes are
//! allowed, which RPC node serves them, and how long to wait for it.
//!
//! ```toml
//! rpc_timeout_secs = 10
//!
//! [[endpoints]]
//! suffix = "nzaza.testnet"
//! url = "https://rpc.testnet.fastnear.com"
//!
//! [[endpoints]]
//! suffix = "sudostake.near"
//! url = "https://rpc.mainnet.fastnear.com"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::registry::{Endpoint, EndpointRegistry};

// ---------------------------------------------------------------------------
// Contract Call
// ---------------------------------------------------------------------------

/// View method every vault contract exposes.
pub const VIEW_METHOD: &str = "get_vault_state";

/// Finality requested for view calls. Only final blocks are indexed.
pub const FINALITY: &str = "final";

/// JSON arguments passed to the view method. It takes none.
pub const EMPTY_ARGS_JSON: &str = "{}";

/// JSON-RPC method used by NEAR nodes for all read queries.
pub const RPC_QUERY_METHOD: &str = "query";

/// `request_type` for a contract view call within a `query`.
pub const CALL_FUNCTION_REQUEST: &str = "call_function";

/// Nanoseconds per millisecond. Contract timestamps are nanoseconds.
pub const NANOS_PER_MILLI: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Allow-list
// ---------------------------------------------------------------------------

/// Suffixes indexed out of the box, in resolution order.
pub const DEFAULT_ENDPOINTS: &[(&str, &str)] = &[
    ("nzaza.testnet", "https://rpc.testnet.fastnear.com"),
    ("sudostake.near", "https://rpc.mainnet.fastnear.com"),
];

// ---------------------------------------------------------------------------
// Service Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Default RPC request timeout, in seconds.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Config File
// ---------------------------------------------------------------------------

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid endpoint registry: {0}")]
    InvalidRegistry(String),
}

/// Operator-facing configuration, usually read from a TOML file.
///
/// Every field has a default, so an empty file (or no file at all) yields
/// the built-in allow-list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    /// Allow-listed suffixes and their RPC endpoints, in resolution order.
    pub endpoints: Vec<Endpoint>,
    /// Per-request RPC timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS
                .iter()
                .map(|(suffix, url)| Endpoint::new(*suffix, *url))
                .collect(),
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
        }
    }
}

impl IndexerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Build the validated endpoint registry.
    pub fn registry(&self) -> Result<EndpointRegistry, ConfigError> {
        EndpointRegistry::new(self.endpoints.clone())
    }

    /// RPC timeout as a [`Duration`].
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_builtin_endpoints() {
        let config = IndexerConfig::default();
        assert_eq!(config.endpoints.len(), DEFAULT_ENDPOINTS.len());
        assert_eq!(config.endpoints[0].suffix, "nzaza.testnet");
        assert_eq!(config.rpc_timeout(), Duration::from_secs(10));
        assert!(config.registry().is_ok());
    }

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let config = IndexerConfig::from_toml_str("").unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.rpc_timeout_secs, DEFAULT_RPC_TIMEOUT_SECS);
    }

    #[test]
    fn endpoints_keep_file_order() {
        let config = IndexerConfig::from_toml_str(
            r#"
            rpc_timeout_secs = 3

            [[endpoints]]
            suffix = "b.testnet"
            url = "http://b"

            [[endpoints]]
            suffix = "a.testnet"
            url = "http://a"
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc_timeout_secs, 3);
        let suffixes: Vec<_> = config.endpoints.iter().map(|e| e.suffix.as_str()).collect();
        assert_eq!(suffixes, ["b.testnet", "a.testnet"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = IndexerConfig::from_toml_str("rpc_timeout = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn duplicate_suffix_fails_registry_build() {
        let config = IndexerConfig::from_toml_str(
            r#"
            [[endpoints]]
            suffix = "x.near"
            url = "http://one"

            [[endpoints]]
            suffix = "x.near"
            url = "http://two"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.registry(),
            Err(ConfigError::InvalidRegistry(_))
        ));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.toml");
        std::fs::write(&path, "rpc_timeout_secs = 42\n").unwrap();

        let config = IndexerConfig::load(&path).unwrap();
        assert_eq!(config.rpc_timeout_secs, 42);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = IndexerConfig::load(Path::new("/nonexistent/indexer.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
