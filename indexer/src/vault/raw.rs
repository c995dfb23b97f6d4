//! Raw vault state as decoded from the contract's view call.
//!
//! Field names match the contract's JSON exactly. Optional sections are
//! `null` or absent when not set; both decode to `None`. Unknown fields are
//! ignored so a contract upgrade that adds fields does not break indexing.

use serde::{de, Deserialize, Deserializer, Serialize};

/// Vault state exactly as `get_vault_state` reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVaultState {
    /// Account that owns the vault.
    pub owner: String,
    /// Open request to borrow against the vault's stake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity_request: Option<LiquidityRequest>,
    /// Lender match for the open request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_offer: Option<RawAcceptedOffer>,
    /// Progress of a liquidation after a missed repayment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation: Option<Liquidation>,
}

/// A borrow request. Amounts are decimal strings of `u128` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityRequest {
    /// NEP-141 token account the borrower wants.
    pub token: String,
    /// Principal, in the token's smallest unit.
    pub amount: String,
    /// Interest owed on top of the principal, same unit.
    pub interest: String,
    /// Staked NEAR pledged as collateral, in yoctoNEAR.
    pub collateral: String,
    /// Loan term in seconds.
    pub duration: u64,
}

/// An accepted offer with the contract's nanosecond timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAcceptedOffer {
    /// Account that funded the request.
    pub lender: String,
    /// Block timestamp of acceptance, nanoseconds since the Unix epoch.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub accepted_at: u64,
}

/// Liquidation progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liquidation {
    /// Amount already liquidated, in yoctoNEAR.
    pub liquidated: String,
}

/// NEAR serializes `U64` as a decimal string while plain `u64` is a JSON
/// number. Accept either.
fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid u64 string: {:?}", s))),
    }
}
