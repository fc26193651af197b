use alloy::primitives::{address, Address, U256};
use balance_shares::{BalanceShares, BalanceSharesConfig, CallContext, MemoryHost};
use proptest::prelude::*;

const CLIENT: Address = address!("0x00000000000000000000000000000000000000c1");
const ASSET: Address = address!("0x00000000000000000000000000000000000000e1");

fn account(index: usize) -> Address {
    Address::with_last_byte(0x10 + index as u8)
}

#[derive(Debug, Clone)]
enum Op {
    Allocate(u64),
    AllocateWithRemainder(u64),
    SetBps(usize, u16),
    Withdraw(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..1_000_000).prop_map(Op::Allocate),
        3 => (1u64..1_000).prop_map(Op::AllocateWithRemainder),
        2 => (0usize..4, 0u16..=4000).prop_map(|(index, bps)| Op::SetBps(index, bps)),
        2 => (0usize..4).prop_map(Op::Withdraw),
    ]
}

fn ledger() -> BalanceShares<MemoryHost> {
    utils::tracing::setup_test_tracing();
    let mut host = MemoryHost::new();
    host.mint(ASSET, CLIENT, U256::MAX >> 1usize);
    BalanceShares::new(host, BalanceSharesConfig::default())
}

fn withdraw_all_periods(ledger: &mut BalanceShares<MemoryHost>, account: Address) -> U256 {
    let mut total = U256::ZERO;
    let Some(last) = ledger.account_share_period_index(CLIENT, U256::ZERO, account) else {
        return total;
    };
    for period_index in 0..=last {
        let amounts = ledger
            .withdraw_account_share_period_to(
                &CallContext::new(account, 0),
                CLIENT,
                U256::ZERO,
                account,
                &[ASSET],
                period_index,
            )
            .expect("withdrawal of an existing period");
        total += amounts[0];
    }
    total
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_ledger_invariants(ops in prop::collection::vec(op(), 1..40)) {
        let mut ledger = ledger();
        let client = CallContext::new(CLIENT, 0);
        let mut last_checkpoint = 0;

        for op in ops {
            match op {
                Op::Allocate(amount) => {
                    let _ = ledger.allocate_to_balance_share(&client, CLIENT, U256::ZERO, ASSET, U256::from(amount));
                }
                Op::AllocateWithRemainder(increase) => {
                    let total_bps = ledger.balance_share_total_bps(CLIENT, U256::ZERO);
                    let checkpoint = ledger.balance_share_checkpoint_index(CLIENT, U256::ZERO);
                    let before = ledger.balance_sum(CLIENT, U256::ZERO, checkpoint, ASSET).remainder;
                    if let Ok(pulled) = ledger.allocate_to_balance_share_with_remainder(&client, U256::ZERO, ASSET, U256::from(increase)) {
                        // the carry is exact: nothing is created or lost by truncation
                        let checkpoint = ledger.balance_share_checkpoint_index(CLIENT, U256::ZERO);
                        let after = ledger.balance_sum(CLIENT, U256::ZERO, checkpoint, ASSET).remainder;
                        prop_assert_eq!(
                            pulled * U256::from(10_000) + after,
                            U256::from(increase) * U256::from(total_bps) + before
                        );
                    }
                }
                Op::SetBps(index, bps) => {
                    let checkpoint = ledger.balance_share_checkpoint_index(CLIENT, U256::ZERO);
                    let before = ledger.balance_sum(CLIENT, U256::ZERO, checkpoint, ASSET).remainder;
                    let _ = ledger.set_account_shares_bps(&client, CLIENT, U256::ZERO, &[account(index)], &[bps]);
                    let checkpoint = ledger.balance_share_checkpoint_index(CLIENT, U256::ZERO);
                    prop_assert_eq!(ledger.balance_sum(CLIENT, U256::ZERO, checkpoint, ASSET).remainder, before);
                }
                Op::Withdraw(index) => {
                    withdraw_all_periods(&mut ledger, account(index));
                }
            }

            let active: u32 = (0..4)
                .map(|index| u32::from(ledger.account_share_bps(CLIENT, U256::ZERO, account(index))))
                .sum();
            prop_assert_eq!(active, u32::from(ledger.balance_share_total_bps(CLIENT, U256::ZERO)));
            prop_assert!(active <= 10_000);

            let checkpoint = ledger.balance_share_checkpoint_index(CLIENT, U256::ZERO);
            prop_assert!(checkpoint >= last_checkpoint);
            last_checkpoint = checkpoint;

            // allocated funds stay in custody until claimed
            let paid = (0..4).fold(U256::ZERO, |acc, index| acc + ledger.host().balance_of(ASSET, account(index)));
            let allocated = (0..=checkpoint).fold(U256::ZERO, |acc, index| {
                acc + ledger.balance_sum(CLIENT, U256::ZERO, index, ASSET).balance
            });
            prop_assert_eq!(paid + ledger.host().custody_of(ASSET), allocated);
        }

        for index in 0..4 {
            withdraw_all_periods(&mut ledger, account(index));
            prop_assert!(withdraw_all_periods(&mut ledger, account(index)).is_zero());
        }

        // each recipient loses at most one unit of truncation per checkpoint
        let checkpoints = ledger.balance_share_checkpoint_index(CLIENT, U256::ZERO) + 1;
        prop_assert!(ledger.host().custody_of(ASSET) <= U256::from(4 * checkpoints));
    }
}
