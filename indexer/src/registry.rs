//! # Endpoint Registry
//!
//! The allow-list of vault factories this indexer serves. Each entry maps
//! an account suffix (the factory account, e.g. `sudostake.near`) to the RPC
//! node that can answer view calls for accounts under it.
//!
//! Entries are kept as an ordered list rather than a map. Resolution scans
//! them in order and the first suffix the identifier ends with wins, so when
//! two suffixes overlap (`near` and `sudostake.near`) precedence is simply
//! the order the operator wrote them in.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, DEFAULT_ENDPOINTS};
use crate::error::{IndexerError, IndexerResult};

/// One allow-listed suffix and the RPC endpoint that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Trailing segment of the vault account id, also the factory id.
    pub suffix: String,
    /// JSON-RPC URL of a node on the matching network.
    pub url: String,
}

impl Endpoint {
    pub fn new(suffix: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            url: url.into(),
        }
    }
}

/// Outcome of resolving a vault identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    /// RPC endpoint to query.
    pub endpoint: &'a str,
    /// Matched suffix. Doubles as the store collection name.
    pub suffix: &'a str,
}

/// Ordered, immutable suffix → endpoint allow-list.
///
/// Built once at startup and shared read-only; pass a different instance to
/// test against an alternate allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRegistry {
    entries: Vec<Endpoint>,
}

impl EndpointRegistry {
    /// Build a registry, rejecting blank fields and duplicate suffixes.
    pub fn new(entries: Vec<Endpoint>) -> Result<Self, ConfigError> {
        for (i, entry) in entries.iter().enumerate() {
            if entry.suffix.trim().is_empty() {
                return Err(ConfigError::InvalidRegistry(format!(
                    "entry {} has an empty suffix",
                    i
                )));
            }
            if entry.url.trim().is_empty() {
                return Err(ConfigError::InvalidRegistry(format!(
                    "suffix {} has an empty url",
                    entry.suffix
                )));
            }
            if entries[..i].iter().any(|e| e.suffix == entry.suffix) {
                return Err(ConfigError::InvalidRegistry(format!(
                    "duplicate suffix {}",
                    entry.suffix
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Map a vault identifier to its endpoint and suffix.
    ///
    /// Fails with [`IndexerError::InvalidInput`] for an empty identifier and
    /// [`IndexerError::NotWhitelisted`] when no suffix matches.
    pub fn resolve(&self, identifier: &str) -> IndexerResult<Resolved<'_>> {
        if identifier.is_empty() {
            return Err(IndexerError::InvalidInput(
                "missing or invalid vault address".into(),
            ));
        }

        self.entries
            .iter()
            .find(|e| identifier.ends_with(e.suffix.as_str()))
            .map(|e| Resolved {
                endpoint: &e.url,
                suffix: &e.suffix,
            })
            .ok_or_else(|| {
                IndexerError::NotWhitelisted(format!("vault address not allowed: {}", identifier))
            })
    }

    /// Exact suffix lookup. Used to allow-list factory ids on queries.
    pub fn endpoint_for(&self, suffix: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.suffix == suffix)
            .map(|e| e.url.as_str())
    }

    /// Entries in resolution order.
    pub fn entries(&self) -> &[Endpoint] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self {
            entries: DEFAULT_ENDPOINTS
                .iter()
                .map(|(suffix, url)| Endpoint::new(*suffix, *url))
                .collect(),
        }
    }
}
