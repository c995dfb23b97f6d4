//! Raw → stored conversion.

use chrono::{DateTime, Utc};

use super::raw::{RawAcceptedOffer, RawVaultState};
use super::state::{AcceptedOffer, TransformedVaultState, VaultLifecycle};
use crate::config::NANOS_PER_MILLI;

/// Classify a raw vault and convert it into its stored form.
///
/// Pure and total. Request, liquidation and big-integer strings are moved
/// across untouched; `accepted_at` is truncated to milliseconds, which is
/// lossy and one-way. Sections missing from `raw` stay missing.
pub fn normalize(raw: RawVaultState) -> TransformedVaultState {
    let state = VaultLifecycle::classify(
        raw.liquidity_request.is_some(),
        raw.accepted_offer.is_some(),
    );

    TransformedVaultState {
        owner: raw.owner,
        state,
        liquidity_request: raw.liquidity_request,
        accepted_offer: raw.accepted_offer.map(AcceptedOffer::from),
        liquidation: raw.liquidation,
    }
}

/// Convert a nanosecond epoch timestamp to a millisecond-precision UTC time,
/// discarding the sub-millisecond remainder.
pub fn nanos_to_timestamp(nanos: u64) -> DateTime<Utc> {
    let millis = (nanos / NANOS_PER_MILLI) as i64;
    // u64::MAX ns is roughly the year 2554, well inside chrono's range.
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

impl From<RawAcceptedOffer> for AcceptedOffer {
    fn from(raw: RawAcceptedOffer) -> Self {
        Self {
            lender: raw.lender,
            accepted_at: nanos_to_timestamp(raw.accepted_at),
        }
    }
}
