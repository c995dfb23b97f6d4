//! # Indexing Pipeline
//!
//! [`VaultIndexer`] ties the pieces together:
//!
//! ```text
//! index_vault(id)
//!   ├─ registry.resolve(id)          → (endpoint, suffix)
//!   ├─ fetcher.fetch(id, endpoint)   → RawVaultState          [await]
//!   ├─ normalize(raw)                → TransformedVaultState
//!   └─ store.write(suffix, id, ..)   → persisted
//! ```
//!
//! and answers the three list queries from the store. Every step's failure
//! aborts the request and is returned as-is; nothing is retried.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{IndexerError, IndexerResult};
use crate::fetcher::VaultFetcher;
use crate::registry::EndpointRegistry;
use crate::rpc::ContractReader;
use crate::store::{SortDirection, VaultStore};
use crate::vault::{normalize, RawVaultState, TransformedVaultState, VaultDocument, VaultLifecycle};

/// Field path of the owner account.
const OWNER_FIELD: &str = "owner";
/// Field path of the lifecycle state.
const STATE_FIELD: &str = "state";
/// Field path of the lender on an accepted offer.
const LENDER_FIELD: &str = "accepted_offer.lender";
/// Field path of the acceptance timestamp.
const ACCEPTED_AT_FIELD: &str = "accepted_offer.accepted_at";

/// The vault indexing service.
///
/// Holds only read-only or internally synchronized state, so one instance
/// is shared behind an `Arc` by all request handlers.
pub struct VaultIndexer {
    registry: EndpointRegistry,
    fetcher: VaultFetcher,
    store: VaultStore,
}

impl VaultIndexer {
    pub fn new(registry: EndpointRegistry, reader: Arc<dyn ContractReader>, store: VaultStore) -> Self {
        Self {
            registry,
            fetcher: VaultFetcher::new(reader),
            store,
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    // -- Fetch & index ------------------------------------------------------

    /// Resolve and fetch a vault. Returns the raw state and matched suffix.
    pub async fn fetch_vault_state(&self, vault: &str) -> IndexerResult<(RawVaultState, String)> {
        let resolved = self.registry.resolve(vault)?;
        let raw = self.fetcher.fetch(vault, resolved.endpoint).await?;
        Ok((raw, resolved.suffix.to_string()))
    }

    /// Fetch and normalize a vault without persisting it.
    pub async fn preview_vault(&self, vault: &str) -> IndexerResult<TransformedVaultState> {
        let (raw, _) = self.fetch_vault_state(vault).await?;
        Ok(normalize(raw))
    }

    /// Fetch, normalize and persist a vault under its factory collection.
    pub async fn index_vault(&self, vault: &str) -> IndexerResult<TransformedVaultState> {
        let (raw, suffix) = self.fetch_vault_state(vault).await?;
        let transformed = normalize(raw);

        info!(
            collection = %suffix,
            vault,
            owner = %transformed.owner,
            state = %transformed.state,
            "indexing vault"
        );

        self.store.write(&suffix, vault, &transformed)?;
        Ok(transformed)
    }

    // -- Queries ------------------------------------------------------------

    /// Ids of vaults in `factory_id` owned by `owner`.
    pub fn user_vaults(&self, factory_id: &str, owner: &str) -> IndexerResult<Vec<String>> {
        if owner.is_empty() || factory_id.is_empty() {
            return Err(IndexerError::InvalidInput(
                "missing 'owner' or 'factory_id' query parameter".into(),
            ));
        }
        self.check_factory(factory_id)?;

        let docs = self
            .store
            .query_by_equality(factory_id, OWNER_FIELD, &json!(owner))?;
        debug!(factory_id, owner, count = docs.len(), "user vaults");
        Ok(docs.into_iter().map(|d| d.id).collect())
    }

    /// Vaults in `factory_id` with an open, unaccepted liquidity request.
    pub fn pending_requests(&self, factory_id: &str) -> IndexerResult<Vec<VaultDocument>> {
        self.require_factory(factory_id)?;

        let docs = self.store.query_by_equality(
            factory_id,
            STATE_FIELD,
            &json!(VaultLifecycle::Pending.as_str()),
        )?;
        debug!(factory_id, count = docs.len(), "pending liquidity requests");
        Ok(docs)
    }

    /// Vaults in `factory_id` funded by `lender`, newest acceptance first.
    pub fn lender_positions(&self, factory_id: &str, lender: &str) -> IndexerResult<Vec<VaultDocument>> {
        self.require_factory(factory_id)?;
        if lender.is_empty() {
            return Err(IndexerError::InvalidInput(
                "missing 'lender_id' query parameter".into(),
            ));
        }

        let docs = self.store.query_by_equality_ordered(
            factory_id,
            LENDER_FIELD,
            &json!(lender),
            ACCEPTED_AT_FIELD,
            SortDirection::Descending,
        )?;
        debug!(factory_id, lender, count = docs.len(), "lender positions");
        Ok(docs)
    }

    fn require_factory(&self, factory_id: &str) -> IndexerResult<()> {
        if factory_id.is_empty() {
            return Err(IndexerError::InvalidInput(
                "missing 'factory_id' query parameter".into(),
            ));
        }
        self.check_factory(factory_id)
    }

    fn check_factory(&self, factory_id: &str) -> IndexerResult<()> {
        match self.registry.endpoint_for(factory_id) {
            Some(_) => Ok(()),
            None => Err(IndexerError::NotWhitelisted(format!(
                "unauthorized factory_id: {}",
                factory_id
            ))),
        }
    }
}
