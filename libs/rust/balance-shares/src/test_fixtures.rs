use crate::{
    config::BalanceSharesConfig, errors::Result, host::CallContext, ledger::BalanceShares,
    memory_host::MemoryHost,
};
use alloy::primitives::{address, Address, U256};

pub const CLIENT: Address = address!("0x00000000000000000000000000000000000000c1");
pub const ALICE: Address = address!("0x00000000000000000000000000000000000000a1");
pub const BOB: Address = address!("0x00000000000000000000000000000000000000b1");
pub const CAROL: Address = address!("0x00000000000000000000000000000000000000d1");
pub const TOKEN: Address = address!("0x00000000000000000000000000000000000000e1");
pub const SHARE_ID: U256 = U256::from_limbs([1, 0, 0, 0]);

pub fn ledger() -> BalanceShares<MemoryHost> {
    utils::tracing::setup_test_tracing();
    BalanceShares::new(MemoryHost::new(), BalanceSharesConfig::default())
}

pub fn client_ctx(timestamp: u64) -> CallContext {
    CallContext::new(CLIENT, timestamp)
}

/// Mints `amount` of [`TOKEN`] to the client and allocates all of it.
pub fn fund_and_allocate(ledger: &mut BalanceShares<MemoryHost>, amount: U256) -> Result<()> {
    ledger.host_mut().mint(TOKEN, CLIENT, amount);
    ledger.allocate_to_balance_share(&client_ctx(0), CLIENT, SHARE_ID, TOKEN, amount)
}
