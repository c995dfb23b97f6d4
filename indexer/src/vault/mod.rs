//! # Vault Module: Contract State & Lifecycle
//!
//! A vault is a contract account whose owner can post a liquidity request
//! (borrow `amount` of `token` against `collateral` for `duration` seconds at
//! `interest`). A lender accepting it turns the request into a loan; an
//! unpaid loan can end in liquidation. This module holds the two shapes a
//! vault passes through inside the indexer and the conversion between them.
//!
//! ## Architecture
//!
//! ```text
//! raw.rs        RawVaultState, exactly what `get_vault_state` returns
//! state.rs      TransformedVaultState, what gets stored and served
//! normalize.rs  Lifecycle classification and raw → stored conversion
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//!    ┌────────┐  request posted  ┌─────────┐  offer accepted  ┌────────┐
//!    │  Idle  │ ───────────────► │ Pending │ ───────────────► │ Active │
//!    └────────┘                  └─────────┘                  └────────┘
//!         ▲          cancelled         │   repaid / liquidated     │
//!         └────────────────────────────┴───────────────────────────┘
//! ```
//!
//! The indexer never tracks transitions. The state is recomputed from the
//! presence of `liquidity_request` and `accepted_offer` on every fetch.
//!
//! ## Precision
//!
//! Token amounts are `u128`-sized on chain and arrive as decimal strings.
//! They stay strings end to end. The only numeric conversion is the
//! acceptance timestamp, truncated from nanoseconds to milliseconds.

pub mod normalize;
pub mod raw;
pub mod state;

pub use normalize::{nanos_to_timestamp, normalize};
pub use raw::{Liquidation, LiquidityRequest, RawAcceptedOffer, RawVaultState};
pub use state::{AcceptedOffer, TransformedVaultState, VaultDocument, VaultLifecycle};
