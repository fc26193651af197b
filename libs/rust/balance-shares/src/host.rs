use crate::events::BalanceShareEvent;
use alloy::primitives::{Address, B256, U256};

/// Caller-supplied execution context of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub sender: Address,
    /// Seconds since the unix epoch.
    pub timestamp: u64,
    /// Native currency attached to the call.
    pub value: U256,
}

impl CallContext {
    pub fn new(sender: Address, timestamp: u64) -> Self {
        Self {
            sender,
            timestamp,
            value: U256::ZERO,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Asset custody and environment the ledger runs against.
///
/// Ledger bookkeeping is always written before the host is asked to move assets;
/// a failing transfer makes the ledger restore its previous state.
pub trait AssetHost {
    /// Takes `amount` of `asset` from `from` into custody.
    fn receive(&mut self, asset: Address, from: Address, amount: U256) -> anyhow::Result<()>;

    /// Pays every `(asset, amount)` to `to`. Must apply all payouts or none.
    fn send(&mut self, to: Address, payouts: &[(Address, U256)]) -> anyhow::Result<()>;

    /// Whether `account` has code and therefore signs through EIP-1271.
    fn is_contract(&self, _account: Address) -> bool {
        false
    }

    /// EIP-1271 `isValidSignature` of a contract account.
    fn is_valid_signature(&self, _account: Address, _hash: B256, _signature: &[u8]) -> bool {
        false
    }

    fn emit(&mut self, _event: BalanceShareEvent) {}
}
