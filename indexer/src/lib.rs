// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Indexer: Core Library
//!
//! Reads the state of SudoStake lending vaults straight from a NEAR RPC node,
//! classifies each vault into a lifecycle state, and keeps a queryable copy
//! of it in a local document store.
//!
//! The chain is the source of truth. This crate never writes to it; it only
//! mirrors what a `get_vault_state` view call returns, in a shape that is
//! cheap to filter by owner, by state, or by lender.
//!
//! ## Architecture
//!
//! - **registry**: Allow-list mapping account suffixes to RPC endpoints.
//! - **rpc**: JSON-RPC transport for read-only contract calls.
//! - **fetcher**: Builds the view call and decodes the returned bytes.
//! - **vault**: Raw and normalized vault records, lifecycle classification.
//! - **store**: sled-backed document store with field-path queries.
//! - **indexer**: The end-to-end pipeline and list queries.
//! - **config**: Constants and the optional TOML configuration file.
//! - **error**: The error taxonomy shared by all of the above.
//!
//! ## Pipeline
//!
//! ```text
//! vault id ─► EndpointRegistry ─► VaultFetcher ─► normalize ─► VaultStore
//!              (suffix, url)      RawVaultState   Transformed    (suffix/id)
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod indexer;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod vault;

pub use error::{IndexerError, IndexerResult};
pub use fetcher::VaultFetcher;
pub use indexer::VaultIndexer;
pub use registry::{Endpoint, EndpointRegistry, Resolved};
pub use rpc::{ContractReader, JsonRpcClient};
pub use store::{SortDirection, VaultStore};
pub use vault::{normalize, RawVaultState, TransformedVaultState, VaultDocument, VaultLifecycle};
