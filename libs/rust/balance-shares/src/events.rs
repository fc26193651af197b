use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BalanceShareEvent {
    AccountShareUpdated {
        client: Address,
        balance_share_id: U256,
        account: Address,
        bps: u16,
        removable_at: u64,
        /// `None` when the account was removed before ever holding a period.
        period_index: Option<u64>,
    },
    BalanceShareAllocated {
        client: Address,
        balance_share_id: U256,
        asset: Address,
        amount: U256,
        checkpoint_index: u64,
    },
    AccountSharePeriodWithdrawal {
        client: Address,
        balance_share_id: U256,
        account: Address,
        receiver: Address,
        asset: Address,
        period_index: u64,
        amount: U256,
    },
}
