//! In-memory custody for running ledgers off-chain and in tests.

use crate::{events::BalanceShareEvent, host::AssetHost, signatures::recover_signer};
use alloy::primitives::{Address, B256, U256};
use anyhow::{anyhow, ensure, Result};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    // (asset, holder) -> balance
    balances: HashMap<(Address, Address), U256>,
    custody: HashMap<Address, U256>,
    // contract wallet -> owner whose ECDSA signatures it accepts
    contract_wallets: HashMap<Address, Address>,
    rejecting_receivers: HashSet<Address>,
    events: Vec<BalanceShareEvent>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, asset: Address, holder: Address, amount: U256) {
        *self.balances.entry((asset, holder)).or_default() += amount;
    }

    pub fn balance_of(&self, asset: Address, holder: Address) -> U256 {
        self.balances
            .get(&(asset, holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn custody_of(&self, asset: Address) -> U256 {
        self.custody.get(&asset).copied().unwrap_or_default()
    }

    /// Treats `wallet` as a contract account validating signatures of `owner`.
    pub fn register_contract_wallet(&mut self, wallet: Address, owner: Address) {
        self.contract_wallets.insert(wallet, owner);
    }

    /// Every payout to `receiver` fails from now on.
    pub fn reject_transfers_to(&mut self, receiver: Address) {
        self.rejecting_receivers.insert(receiver);
    }

    pub fn events(&self) -> &[BalanceShareEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<BalanceShareEvent> {
        std::mem::take(&mut self.events)
    }
}

impl AssetHost for MemoryHost {
    fn receive(&mut self, asset: Address, from: Address, amount: U256) -> Result<()> {
        let balance = self.balance_of(asset, from);
        ensure!(
            balance >= amount,
            "{from} holds {balance} of {asset}, needs {amount}"
        );

        self.balances.insert((asset, from), balance - amount);
        *self.custody.entry(asset).or_default() += amount;
        debug!(asset = %asset, from = %from, amount = %amount, "Received into custody");
        Ok(())
    }

    fn send(&mut self, to: Address, payouts: &[(Address, U256)]) -> Result<()> {
        if self.rejecting_receivers.contains(&to) {
            return Err(anyhow!("Receiver {to} rejected the transfer"));
        }

        let mut required: HashMap<Address, U256> = HashMap::new();
        for (asset, amount) in payouts {
            let total = required.entry(*asset).or_default();
            *total = total
                .checked_add(*amount)
                .ok_or_else(|| anyhow!("Payout total of {asset} overflows"))?;
        }
        for (asset, amount) in &required {
            let held = self.custody_of(*asset);
            ensure!(held >= *amount, "Custody holds {held} of {asset}, needs {amount}");
        }

        for (asset, amount) in payouts {
            *self.custody.entry(*asset).or_default() -= *amount;
            *self.balances.entry((*asset, to)).or_default() += *amount;
        }
        Ok(())
    }

    fn is_contract(&self, account: Address) -> bool {
        self.contract_wallets.contains_key(&account)
    }

    fn is_valid_signature(&self, account: Address, hash: B256, signature: &[u8]) -> bool {
        self.contract_wallets
            .get(&account)
            .is_some_and(|owner| recover_signer(&hash, signature) == Some(*owner))
    }

    fn emit(&mut self, event: BalanceShareEvent) {
        self.events.push(event);
    }
}
