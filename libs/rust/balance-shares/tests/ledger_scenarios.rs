use alloy::primitives::{address, Address, U256};
use anyhow::Result;
use balance_shares::{
    storage::BalanceShareStore, BalanceShareError, BalanceShareEvent, BalanceShares,
    BalanceSharesConfig, CallContext, MemoryHost,
};
use std::env;

const DAO: Address = address!("0x000000000000000000000000000000000000da01");
const TREASURY_FUNDER: Address = address!("0x000000000000000000000000000000000000f001");
const X: Address = address!("0x0000000000000000000000000000000000000a01");
const Y: Address = address!("0x0000000000000000000000000000000000000b01");
const USDC: Address = address!("0x0000000000000000000000000000000000000e01");
const WETH: Address = address!("0x0000000000000000000000000000000000000e02");

fn share_id() -> U256 {
    U256::from(7)
}

fn setup() -> BalanceShares<MemoryHost> {
    utils::tracing::setup_test_tracing();
    let mut host = MemoryHost::new();
    host.mint(USDC, DAO, U256::from(1_000_000));
    host.mint(WETH, DAO, U256::from(1_000_000));
    host.mint(USDC, TREASURY_FUNDER, U256::from(1_000_000));
    BalanceShares::new(host, BalanceSharesConfig::default())
}

fn dao(timestamp: u64) -> CallContext {
    CallContext::new(DAO, timestamp)
}

fn withdraw(ledger: &mut BalanceShares<MemoryHost>, account: Address, assets: &[Address], period_index: u64) -> Result<Vec<U256>> {
    Ok(ledger.withdraw_account_share_period_to(
        &CallContext::new(account, 0),
        DAO,
        share_id(),
        account,
        assets,
        period_index,
    )?)
}

#[test]
fn test_share_lifecycle() -> Result<()> {
    let mut ledger = setup();

    ledger.set_account_shares(&dao(0), DAO, share_id(), &[X, Y], &[3000, 2000], &[0, 100])?;
    ledger.allocate_to_balance_share(&dao(0), DAO, share_id(), USDC, U256::from(1000))?;

    assert_eq!(withdraw(&mut ledger, X, &[USDC], 0)?, vec![U256::from(600)]);
    assert_eq!(withdraw(&mut ledger, Y, &[USDC], 0)?, vec![U256::from(400)]);
    assert_eq!(ledger.balance_sum(DAO, share_id(), 0, USDC).balance, U256::from(1000));

    assert_eq!(
        ledger.set_account_shares_bps(&dao(99), DAO, share_id(), &[Y], &[0]),
        Err(BalanceShareError::AccountShareLocked {
            account: Y,
            removable_at: 100
        })
    );
    ledger.set_account_shares_bps(&dao(100), DAO, share_id(), &[Y], &[0])?;
    assert_eq!(ledger.balance_share_checkpoint_index(DAO, share_id()), 1);
    assert_eq!(ledger.balance_share_total_bps(DAO, share_id()), 3000);

    ledger.allocate_to_balance_share(&dao(101), DAO, share_id(), USDC, U256::from(900))?;

    assert_eq!(withdraw(&mut ledger, X, &[USDC], 0)?, vec![U256::from(900)]);
    assert_eq!(withdraw(&mut ledger, Y, &[USDC], 0)?, vec![U256::ZERO]);
    assert_eq!(ledger.host().balance_of(USDC, X), U256::from(1500));
    assert_eq!(ledger.host().balance_of(USDC, Y), U256::from(400));
    assert_eq!(ledger.host().custody_of(USDC), U256::ZERO);
    Ok(())
}

#[test]
fn test_out_of_order_period_withdrawals() -> Result<()> {
    let mut ledger = setup();

    ledger.set_account_shares(&dao(0), DAO, share_id(), &[X], &[5000], &[0])?;
    ledger.allocate_to_balance_share(&dao(0), DAO, share_id(), USDC, U256::from(100))?;
    ledger.allocate_to_balance_share(&dao(0), DAO, share_id(), WETH, U256::from(40))?;

    ledger.set_account_shares_bps(&dao(1), DAO, share_id(), &[X], &[2500])?;
    ledger.allocate_to_balance_share(&dao(1), DAO, share_id(), USDC, U256::from(200))?;

    // newest period first, then the closed one
    assert_eq!(withdraw(&mut ledger, X, &[USDC, WETH], 1)?, vec![U256::from(200), U256::ZERO]);
    assert_eq!(withdraw(&mut ledger, X, &[WETH, USDC], 0)?, vec![U256::from(40), U256::from(100)]);
    assert_eq!(withdraw(&mut ledger, X, &[USDC, WETH], 0)?, vec![U256::ZERO, U256::ZERO]);

    let period = ledger
        .account_share_period(DAO, share_id(), X, 0)
        .expect("closed period");
    assert_eq!((period.start_checkpoint_index, period.end_checkpoint_index), (0, 1));
    Ok(())
}

#[test]
fn test_anyone_can_fund() -> Result<()> {
    let mut ledger = setup();
    ledger.set_account_shares(&dao(0), DAO, share_id(), &[X], &[10_000], &[0])?;

    ledger.allocate_to_balance_share(
        &CallContext::new(TREASURY_FUNDER, 0),
        DAO,
        share_id(),
        USDC,
        U256::from(250),
    )?;

    assert_eq!(ledger.host().balance_of(USDC, TREASURY_FUNDER), U256::from(999_750));
    assert_eq!(withdraw(&mut ledger, X, &[USDC], 0)?, vec![U256::from(250)]);
    Ok(())
}

#[test]
fn test_events_follow_operations() -> Result<()> {
    let mut ledger = setup();
    ledger.set_account_shares(&dao(0), DAO, share_id(), &[X], &[4000], &[0])?;
    ledger.allocate_to_balance_share(&dao(0), DAO, share_id(), USDC, U256::from(10))?;
    withdraw(&mut ledger, X, &[USDC], 0)?;

    let events = ledger.host_mut().take_events();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[2],
        BalanceShareEvent::AccountSharePeriodWithdrawal {
            client: DAO,
            balance_share_id: share_id(),
            account: X,
            receiver: X,
            asset: USDC,
            period_index: 0,
            amount: U256::from(10),
        }
    );

    let json = serde_json::to_value(&events[1])?;
    assert_eq!(json["event"], "balance_share_allocated");
    Ok(())
}

#[test]
fn test_snapshot_resumes_ledger() -> Result<()> {
    let mut ledger = setup();
    ledger.set_account_shares(&dao(0), DAO, share_id(), &[X, Y], &[3000, 2000], &[0, 0])?;
    ledger.allocate_to_balance_share(&dao(0), DAO, share_id(), USDC, U256::from(1000))?;
    withdraw(&mut ledger, X, &[USDC], 0)?;

    let path = env::temp_dir().join(format!("balance-shares-resume-{}.json", std::process::id()));
    ledger.store().save_snapshot(&path)?;
    let (_, host) = ledger.into_parts();

    let store = BalanceShareStore::load_snapshot(&path)?;
    let mut resumed = BalanceShares::with_store(host, BalanceSharesConfig::default(), store);
    std::fs::remove_file(&path)?;

    assert_eq!(withdraw(&mut resumed, X, &[USDC], 0)?, vec![U256::ZERO]);
    assert_eq!(withdraw(&mut resumed, Y, &[USDC], 0)?, vec![U256::from(400)]);
    Ok(())
}
