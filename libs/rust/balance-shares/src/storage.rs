//! Persistent data model of the balance share ledgers.
//!
//! Every ledger is keyed by `(client, balance_share_id)`. Checkpoints and account
//! share periods are append-only: nothing is ever deleted, which is what lets
//! withdrawals be reconstructed lazily and out of order.

use crate::errors::{BalanceShareError, Result};
use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::HashMap, fs, path::Path};
use tracing::{debug, instrument};
use utils::errors::{
    SNAPSHOT_DESERIALIZE_FAILED, SNAPSHOT_INVALID_LEDGER, SNAPSHOT_READ_FAILED,
    SNAPSHOT_SERIALIZE_FAILED, SNAPSHOT_WRITE_FAILED,
};

/// Largest cumulative balance one checkpoint can hold for one asset (2^208 - 1).
pub const MAX_BALANCE_SUM_BALANCE: U256 = U256::from_limbs([u64::MAX, u64::MAX, u64::MAX, 0xFFFF]);

/// Largest storable allocation remainder (2^48 - 1).
pub const MAX_BALANCE_SUM_REMAINDER: U256 = U256::from_limbs([0xFFFF_FFFF_FFFF, 0, 0, 0]);

/// Ceiling for checkpoint indices (2^48 - 1).
pub const MAX_CHECKPOINT_INDEX: u64 = 0xFFFF_FFFF_FFFF;

/// End index of a period that is still active.
pub const OPEN_PERIOD_END: u64 = u64::MAX;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSum {
    /// Cumulative amount ever allocated into the checkpoint. Never decreases.
    pub balance: U256,
    /// Truncated fraction of previous allocations, scaled by 10000.
    pub remainder: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSumCheckpoint {
    pub total_bps: u16,
    pub has_balances: bool,
    pub balance_sums: HashMap<Address, BalanceSum>,
}

impl BalanceSumCheckpoint {
    /// Successor checkpoint: no balances, pending remainders carried over.
    fn carry_forward(&self, total_bps: u16) -> Self {
        let balance_sums = self
            .balance_sums
            .iter()
            .filter(|(_, sum)| !sum.remainder.is_zero())
            .map(|(asset, sum)| {
                let carried = BalanceSum {
                    balance: U256::ZERO,
                    remainder: sum.remainder,
                };
                (*asset, carried)
            })
            .collect();

        Self {
            total_bps,
            has_balances: false,
            balance_sums,
        }
    }

    pub fn balance_sum(&self, asset: Address) -> BalanceSum {
        self.balance_sums.get(&asset).cloned().unwrap_or_default()
    }

    pub fn balance(&self, asset: Address) -> U256 {
        self.balance_sums
            .get(&asset)
            .map(|sum| sum.balance)
            .unwrap_or_default()
    }
}

/// Settlement cursor of one account share period for one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalCheckpoint {
    pub current_checkpoint_index: u64,
    pub previous_balance_at_withdrawal: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSharePeriod {
    pub bps: u16,
    pub start_checkpoint_index: u64,
    /// Exclusive. [`OPEN_PERIOD_END`] while the period is active.
    pub end_checkpoint_index: u64,
    pub initialized_at: u64,
    pub removable_at: u64,
    pub withdrawal_checkpoints: HashMap<Address, WithdrawalCheckpoint>,
}

impl AccountSharePeriod {
    pub fn new(bps: u16, start_checkpoint_index: u64, initialized_at: u64, removable_at: u64) -> Self {
        Self {
            bps,
            start_checkpoint_index,
            end_checkpoint_index: OPEN_PERIOD_END,
            initialized_at,
            removable_at,
            withdrawal_checkpoints: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_checkpoint_index == OPEN_PERIOD_END
    }

    pub fn withdrawal_checkpoint(&self, asset: Address) -> WithdrawalCheckpoint {
        self.withdrawal_checkpoints
            .get(&asset)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountShare {
    /// Indexed by period index; the last entry is the current period.
    pub periods: Vec<AccountSharePeriod>,
}

impl AccountShare {
    pub fn period_index(&self) -> Option<u64> {
        self.periods.len().checked_sub(1).map(|index| index as u64)
    }

    pub fn period(&self, period_index: u64) -> Option<&AccountSharePeriod> {
        usize::try_from(period_index)
            .ok()
            .and_then(|index| self.periods.get(index))
    }

    pub fn period_mut(&mut self, period_index: u64) -> Option<&mut AccountSharePeriod> {
        usize::try_from(period_index)
            .ok()
            .and_then(move |index| self.periods.get_mut(index))
    }

    /// The current period, if it has not been closed.
    pub fn active_period(&self) -> Option<&AccountSharePeriod> {
        self.periods.last().filter(|period| period.is_active())
    }

    pub fn active_period_mut(&mut self) -> Option<&mut AccountSharePeriod> {
        self.periods.last_mut().filter(|period| period.is_active())
    }

    pub fn active_bps(&self) -> u16 {
        self.active_period().map(|period| period.bps).unwrap_or(0)
    }

    pub fn active_removable_at(&self) -> u64 {
        self.active_period()
            .map(|period| period.removable_at)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceShare {
    pub checkpoint_index: u64,
    /// Indexed by checkpoint index, always `checkpoint_index + 1` long.
    pub checkpoints: Vec<BalanceSumCheckpoint>,
    pub accounts: HashMap<Address, AccountShare>,
}

impl Default for BalanceShare {
    fn default() -> Self {
        Self {
            checkpoint_index: 0,
            checkpoints: vec![BalanceSumCheckpoint::default()],
            accounts: HashMap::new(),
        }
    }
}

impl BalanceShare {
    pub fn current_checkpoint(&self) -> &BalanceSumCheckpoint {
        &self.checkpoints[self.checkpoint_index as usize]
    }

    pub fn current_checkpoint_mut(&mut self) -> &mut BalanceSumCheckpoint {
        let index = self.checkpoint_index as usize;
        &mut self.checkpoints[index]
    }

    pub fn checkpoint(&self, checkpoint_index: u64) -> Option<&BalanceSumCheckpoint> {
        usize::try_from(checkpoint_index)
            .ok()
            .and_then(|index| self.checkpoints.get(index))
    }

    pub fn total_bps(&self) -> u16 {
        self.current_checkpoint().total_bps
    }

    pub fn account_share(&self, account: Address) -> Option<&AccountShare> {
        self.accounts.get(&account)
    }

    /// Fails unless `count` more checkpoints fit under [`MAX_CHECKPOINT_INDEX`].
    pub fn ensure_checkpoint_capacity(&self, count: u64) -> Result<()> {
        match self.checkpoint_index.checked_add(count) {
            Some(index) if index <= MAX_CHECKPOINT_INDEX => Ok(()),
            _ => Err(BalanceShareError::CheckpointIndexOverflow),
        }
    }

    /// Closes the current checkpoint and opens the next one with `total_bps`.
    /// Allocation remainders move to the new checkpoint.
    pub fn open_checkpoint(&mut self, total_bps: u16) -> Result<u64> {
        self.ensure_checkpoint_capacity(1)?;
        let next = self.current_checkpoint().carry_forward(total_bps);
        self.checkpoints.push(next);
        self.checkpoint_index += 1;
        debug!(
            checkpoint_index = self.checkpoint_index,
            total_bps, "Opened balance sum checkpoint"
        );
        Ok(self.checkpoint_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceShareKey {
    pub client: Address,
    pub balance_share_id: U256,
}

impl BalanceShareKey {
    pub fn new(client: Address, balance_share_id: U256) -> Self {
        Self {
            client,
            balance_share_id,
        }
    }
}

/// All ledgers plus the per-account withdrawal signature nonces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceShareStore {
    #[serde(with = "balance_share_entries")]
    balance_shares: HashMap<BalanceShareKey, BalanceShare>,
    nonces: HashMap<Address, U256>,
}

impl BalanceShareStore {
    pub fn balance_share(&self, client: Address, balance_share_id: U256) -> Option<&BalanceShare> {
        self.balance_shares
            .get(&BalanceShareKey::new(client, balance_share_id))
    }

    /// Creates the ledger with zero-value defaults on first use.
    pub fn balance_share_mut(&mut self, client: Address, balance_share_id: U256) -> &mut BalanceShare {
        self.balance_shares
            .entry(BalanceShareKey::new(client, balance_share_id))
            .or_default()
    }

    pub fn nonce(&self, account: Address) -> U256 {
        self.nonces.get(&account).copied().unwrap_or_default()
    }

    pub fn use_nonce(&mut self, account: Address) -> U256 {
        let nonce = self.nonces.entry(account).or_default();
        let current = *nonce;
        *nonce += U256::from(1);
        current
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context(SNAPSHOT_SERIALIZE_FAILED)
    }

    /// Rejects snapshots whose checkpoint list does not match the checkpoint index.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let store: Self = serde_json::from_str(json).context(SNAPSHOT_DESERIALIZE_FAILED)?;
        store.check_checkpoints().context(SNAPSHOT_INVALID_LEDGER)?;
        Ok(store)
    }

    fn check_checkpoints(&self) -> anyhow::Result<()> {
        for (key, share) in &self.balance_shares {
            if share.checkpoint_index > MAX_CHECKPOINT_INDEX
                || share.checkpoints.len() as u64 != share.checkpoint_index + 1
            {
                return Err(anyhow!(
                    "client {} balance share {}: checkpoint index {} with {} checkpoints",
                    key.client,
                    key.balance_share_id,
                    share.checkpoint_index,
                    share.checkpoints.len()
                ));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = self.to_json()?;
        fs::write(path.as_ref(), json).context(SNAPSHOT_WRITE_FAILED)?;
        debug!(ledgers = self.balance_shares.len(), "Saved ledger snapshot");
        Ok(())
    }

    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_snapshot(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path.as_ref()).context(SNAPSHOT_READ_FAILED)?;
        let store = Self::from_json(&json)?;
        debug!(ledgers = store.balance_shares.len(), "Loaded ledger snapshot");
        Ok(store)
    }
}

// JSON object keys must be strings, so ledgers are written as an ordered list.
mod balance_share_entries {
    use super::*;

    pub fn serialize<S: Serializer>(
        map: &HashMap<BalanceShareKey, BalanceShare>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut entries: Vec<(&BalanceShareKey, &BalanceShare)> = map.iter().collect();
        entries.sort_by_key(|(key, _)| **key);
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<HashMap<BalanceShareKey, BalanceShare>, D::Error> {
        let entries = Vec::<(BalanceShareKey, BalanceShare)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
