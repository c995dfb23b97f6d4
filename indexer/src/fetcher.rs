//! # Vault State Fetcher
//!
//! Turns a vault account id and an RPC endpoint into a decoded
//! [`RawVaultState`]. One view call per fetch: no cache, no retry. The
//! remote state may change between two fetches of the same vault and the
//! fetcher makes no attempt to hide that.

use std::sync::Arc;
use tracing::debug;

use crate::config::{EMPTY_ARGS_JSON, VIEW_METHOD};
use crate::error::{IndexerError, IndexerResult};
use crate::rpc::{ContractReader, FunctionCall};
use crate::vault::RawVaultState;

/// Fetches vault state through a [`ContractReader`].
#[derive(Clone)]
pub struct VaultFetcher {
    reader: Arc<dyn ContractReader>,
}

impl VaultFetcher {
    pub fn new(reader: Arc<dyn ContractReader>) -> Self {
        Self { reader }
    }

    /// Call `get_vault_state` on `identifier` at `endpoint` and decode it.
    ///
    /// An empty identifier fails with [`IndexerError::InvalidInput`] before
    /// anything is sent.
    pub async fn fetch(&self, identifier: &str, endpoint: &str) -> IndexerResult<RawVaultState> {
        if identifier.is_empty() {
            return Err(IndexerError::InvalidInput(
                "missing or invalid vault address".into(),
            ));
        }

        let call = FunctionCall::view(identifier, VIEW_METHOD, EMPTY_ARGS_JSON.as_bytes());
        let result = self.reader.call_function(endpoint, &call).await?;

        debug!(
            vault = identifier,
            bytes = result.result.len(),
            logs = result.logs.len(),
            "vault state received"
        );

        decode_vault_state(&result.result)
    }
}

/// Decode view-call output bytes into a [`RawVaultState`].
///
/// The bytes must be UTF-8 JSON matching the vault schema. A payload that
/// carries an accepted offer without a liquidity request is rejected here:
/// the contract never produces it, so it can only be a corrupt response.
pub fn decode_vault_state(bytes: &[u8]) -> IndexerResult<RawVaultState> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| IndexerError::DecodeFailed(format!("payload is not utf-8: {}", e)))?;

    let raw: RawVaultState = serde_json::from_str(text)
        .map_err(|e| IndexerError::DecodeFailed(format!("payload is not a vault state: {}", e)))?;

    if raw.accepted_offer.is_some() && raw.liquidity_request.is_none() {
        return Err(IndexerError::DecodeFailed(
            "accepted_offer present without liquidity_request".into(),
        ));
    }

    Ok(raw)
}
