//! Checkpoint-based proportional-accrual ledger for DAO treasury balance shares.
//!
//! A client registers recipients with basis-point shares, allocates incoming asset
//! balance into the share, and recipients pull their proportional claim lazily by
//! walking the checkpoint history from their last settlement point.

pub mod accounts;
pub mod allocations;
pub mod bps;
pub mod config;
pub mod errors;
pub mod events;
pub mod host;
pub mod ledger;
pub mod memory_host;
pub mod signatures;
pub mod storage;
pub mod withdrawals;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use allocations::AllocationWithRemainder;
pub use config::BalanceSharesConfig;
pub use errors::{BalanceShareError, Result};
pub use events::BalanceShareEvent;
pub use host::{AssetHost, CallContext};
pub use ledger::BalanceShares;
pub use memory_host::MemoryHost;

/// Asset address denoting the chain's native currency.
pub const NATIVE_ASSET: alloy::primitives::Address = alloy::primitives::Address::ZERO;
