//! Stored vault state: the record written to the document store and
//! returned by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::raw::{Liquidation, LiquidityRequest};

/// Lifecycle state derived from which sections of the vault are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultLifecycle {
    /// No liquidity request.
    Idle,
    /// Liquidity request posted, no lender yet.
    Pending,
    /// Liquidity request accepted by a lender.
    Active,
}

impl VaultLifecycle {
    /// Classify from section presence. The request is checked first, so an
    /// offer without a request still reads as `Idle`.
    pub fn classify(has_liquidity_request: bool, has_accepted_offer: bool) -> Self {
        match (has_liquidity_request, has_accepted_offer) {
            (false, _) => VaultLifecycle::Idle,
            (true, false) => VaultLifecycle::Pending,
            (true, true) => VaultLifecycle::Active,
        }
    }

    /// Wire name, as stored and queried.
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultLifecycle::Idle => "idle",
            VaultLifecycle::Pending => "pending",
            VaultLifecycle::Active => "active",
        }
    }
}

impl fmt::Display for VaultLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted offer with its timestamp at millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedOffer {
    pub lender: String,
    /// Serialized as integer milliseconds since the epoch, which keeps it
    /// sortable in the store.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub accepted_at: DateTime<Utc>,
}

/// Persistence-ready vault record.
///
/// Optional sections are omitted from JSON when absent, never `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformedVaultState {
    pub owner: String,
    pub state: VaultLifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity_request: Option<LiquidityRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_offer: Option<AcceptedOffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation: Option<Liquidation>,
}

/// A stored vault together with its document id (the vault account id).
///
/// Serializes flat: `{ "id": ..., "owner": ..., "state": ..., ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDocument {
    pub id: String,
    #[serde(flatten)]
    pub vault: TransformedVaultState,
}
