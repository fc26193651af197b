use crate::{
    config::BalanceSharesConfig,
    errors::BalanceShareError,
    events::BalanceShareEvent,
    host::AssetHost,
    storage::{AccountSharePeriod, BalanceShare, BalanceShareStore, BalanceSum, BalanceSumCheckpoint},
};
use alloy::{
    primitives::{Address, U256},
    sol_types::Eip712Domain,
};

/// Balance share ledgers of every client, bound to one asset host.
///
/// All mutations take `&mut self` and the ledger owns its host, so a host callback
/// can never observe or re-enter a half-applied operation.
#[derive(Debug)]
pub struct BalanceShares<H: AssetHost> {
    pub(crate) store: BalanceShareStore,
    pub(crate) host: H,
    config: BalanceSharesConfig,
    domain: Eip712Domain,
}

impl<H: AssetHost> BalanceShares<H> {
    pub fn new(host: H, config: BalanceSharesConfig) -> Self {
        Self::with_store(host, config, BalanceShareStore::default())
    }

    pub fn with_store(host: H, config: BalanceSharesConfig, store: BalanceShareStore) -> Self {
        let domain = config.eip712_domain();
        Self {
            store,
            host,
            config,
            domain,
        }
    }

    pub fn store(&self) -> &BalanceShareStore {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &BalanceSharesConfig {
        &self.config
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn into_parts(self) -> (BalanceShareStore, H) {
        (self.store, self.host)
    }

    pub(crate) fn balance_share(&self, client: Address, balance_share_id: U256) -> Option<&BalanceShare> {
        self.store.balance_share(client, balance_share_id)
    }

    pub(crate) fn emit(&mut self, event: BalanceShareEvent) {
        self.host.emit(event);
    }

    pub fn balance_share_total_bps(&self, client: Address, balance_share_id: U256) -> u16 {
        self.balance_share(client, balance_share_id)
            .map(BalanceShare::total_bps)
            .unwrap_or(0)
    }

    pub fn balance_share_checkpoint_index(&self, client: Address, balance_share_id: U256) -> u64 {
        self.balance_share(client, balance_share_id)
            .map(|share| share.checkpoint_index)
            .unwrap_or(0)
    }

    pub fn balance_sum_checkpoint(
        &self,
        client: Address,
        balance_share_id: U256,
        checkpoint_index: u64,
    ) -> Option<BalanceSumCheckpoint> {
        self.balance_share(client, balance_share_id)
            .and_then(|share| share.checkpoint(checkpoint_index))
            .cloned()
    }

    pub fn balance_sum(
        &self,
        client: Address,
        balance_share_id: U256,
        checkpoint_index: u64,
        asset: Address,
    ) -> BalanceSum {
        self.balance_share(client, balance_share_id)
            .and_then(|share| share.checkpoint(checkpoint_index))
            .map(|checkpoint| checkpoint.balance_sum(asset))
            .unwrap_or_default()
    }

    pub fn account_share_period_index(
        &self,
        client: Address,
        balance_share_id: U256,
        account: Address,
    ) -> Option<u64> {
        self.balance_share(client, balance_share_id)
            .and_then(|share| share.account_share(account))
            .and_then(|account_share| account_share.period_index())
    }

    pub fn account_share_period(
        &self,
        client: Address,
        balance_share_id: U256,
        account: Address,
        period_index: u64,
    ) -> Option<AccountSharePeriod> {
        self.balance_share(client, balance_share_id)
            .and_then(|share| share.account_share(account))
            .and_then(|account_share| account_share.period(period_index))
            .cloned()
    }

    /// Bps of the account's active period, 0 when removed or never added.
    pub fn account_share_bps(&self, client: Address, balance_share_id: U256, account: Address) -> u16 {
        self.balance_share(client, balance_share_id)
            .and_then(|share| share.account_share(account))
            .map(|account_share| account_share.active_bps())
            .unwrap_or(0)
    }

    pub fn account_share_removable_at(&self, client: Address, balance_share_id: U256, account: Address) -> u64 {
        self.balance_share(client, balance_share_id)
            .and_then(|share| share.account_share(account))
            .map(|account_share| account_share.active_removable_at())
            .unwrap_or(0)
    }

    /// Next nonce a withdrawal permit of `account` must carry.
    pub fn nonces(&self, account: Address) -> U256 {
        self.store.nonce(account)
    }
}

pub(crate) fn transfer_failed(err: anyhow::Error) -> BalanceShareError {
    BalanceShareError::TransferFailed {
        reason: format!("{err:#}"),
    }
}
