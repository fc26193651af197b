//! Recipient share management.
//!
//! A bps change closes the account's current period at a checkpoint boundary and
//! opens a new one. All edits of one batch share a single boundary: the current
//! checkpoint when it has not received balances yet, otherwise one freshly opened
//! checkpoint.

use crate::{
    bps::{is_valid_bps, MAX_BPS},
    errors::{BalanceShareError, Result},
    events::BalanceShareEvent,
    host::{AssetHost, CallContext},
    ledger::BalanceShares,
    storage::{AccountSharePeriod, BalanceShare},
};
use alloy::primitives::{Address, U256};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AccountShareUpdate {
    account: Address,
    bps: u16,
    removable_at: u64,
}

#[derive(Debug, Clone, Copy)]
struct PlannedUpdate {
    update: AccountShareUpdate,
    bps_changed: bool,
}

impl<H: AssetHost> BalanceShares<H> {
    /// Sets bps and removable_at for every account, returning the new total bps.
    #[instrument(
        skip(self, ctx, accounts, bps, removable_ats),
        fields(sender = %ctx.sender, client = %client, balance_share_id = %balance_share_id, batch = accounts.len())
    )]
    pub fn set_account_shares(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        accounts: &[Address],
        bps: &[u16],
        removable_ats: &[u64],
    ) -> Result<u16> {
        check_lengths(accounts, bps.len())?;
        check_lengths(accounts, removable_ats.len())?;

        let updates: Vec<AccountShareUpdate> = accounts
            .iter()
            .zip(bps)
            .zip(removable_ats)
            .map(|((&account, &bps), &removable_at)| AccountShareUpdate {
                account,
                bps,
                removable_at,
            })
            .collect();

        self.apply_account_share_updates(ctx, client, balance_share_id, &updates)
    }

    /// Sets bps for every account, keeping each account's current removable_at.
    #[instrument(
        skip(self, ctx, accounts, bps),
        fields(sender = %ctx.sender, client = %client, balance_share_id = %balance_share_id, batch = accounts.len())
    )]
    pub fn set_account_shares_bps(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        accounts: &[Address],
        bps: &[u16],
    ) -> Result<u16> {
        check_lengths(accounts, bps.len())?;

        let updates: Vec<AccountShareUpdate> = accounts
            .iter()
            .zip(bps)
            .map(|(&account, &bps)| AccountShareUpdate {
                account,
                bps,
                removable_at: self.account_share_removable_at(client, balance_share_id, account),
            })
            .collect();

        self.apply_account_share_updates(ctx, client, balance_share_id, &updates)
    }

    /// Sets removable_at for every account, keeping each account's current bps.
    #[instrument(
        skip(self, ctx, accounts, removable_ats),
        fields(sender = %ctx.sender, client = %client, balance_share_id = %balance_share_id, batch = accounts.len())
    )]
    pub fn set_account_shares_removable_ats(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        accounts: &[Address],
        removable_ats: &[u64],
    ) -> Result<u16> {
        check_lengths(accounts, removable_ats.len())?;

        let updates: Vec<AccountShareUpdate> = accounts
            .iter()
            .zip(removable_ats)
            .map(|(&account, &removable_at)| AccountShareUpdate {
                account,
                bps: self.account_share_bps(client, balance_share_id, account),
                removable_at,
            })
            .collect();

        self.apply_account_share_updates(ctx, client, balance_share_id, &updates)
    }

    /// The sender lowering (or removing) its own share in `client`'s balance share.
    #[instrument(skip(self, ctx), fields(sender = %ctx.sender, client = %client, balance_share_id = %balance_share_id))]
    pub fn update_account_share_as_account_owner(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        bps: u16,
        removable_at: u64,
    ) -> Result<u16> {
        let update = AccountShareUpdate {
            account: ctx.sender,
            bps,
            removable_at,
        };
        self.apply_account_share_updates(ctx, client, balance_share_id, &[update])
    }

    fn apply_account_share_updates(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        updates: &[AccountShareUpdate],
    ) -> Result<u16> {
        let (planned, new_total_bps) = plan_updates(
            ctx,
            client,
            self.balance_share(client, balance_share_id),
            updates,
        )?;

        let share = self.store.balance_share_mut(client, balance_share_id);
        let any_bps_changed = planned.iter().any(|plan| plan.bps_changed);

        let boundary = if any_bps_changed && share.current_checkpoint().has_balances {
            share.open_checkpoint(new_total_bps)?
        } else {
            if any_bps_changed {
                share.current_checkpoint_mut().total_bps = new_total_bps;
            }
            share.checkpoint_index
        };

        let mut events = Vec::with_capacity(planned.len());
        for PlannedUpdate {
            update,
            bps_changed,
        } in planned
        {
            let account_share = share.accounts.entry(update.account).or_default();

            if bps_changed {
                if let Some(period) = account_share.active_period_mut() {
                    period.end_checkpoint_index = boundary;
                }
                if update.bps > 0 {
                    account_share.periods.push(AccountSharePeriod::new(
                        update.bps,
                        boundary,
                        ctx.timestamp,
                        update.removable_at,
                    ));
                }
            } else if let Some(period) = account_share.active_period_mut() {
                period.removable_at = update.removable_at;
            }

            debug!(
                account = %update.account,
                bps = update.bps,
                removable_at = update.removable_at,
                period_index = ?account_share.period_index(),
                "Account share updated"
            );

            events.push(BalanceShareEvent::AccountShareUpdated {
                client,
                balance_share_id,
                account: update.account,
                bps: update.bps,
                removable_at: update.removable_at,
                period_index: account_share.period_index(),
            });
        }

        info!(
            total_bps = new_total_bps,
            checkpoint_index = boundary,
            updated = events.len(),
            "Account shares set"
        );

        for event in events {
            self.emit(event);
        }

        Ok(new_total_bps)
    }
}

fn check_lengths(accounts: &[Address], values: usize) -> Result<()> {
    if accounts.is_empty() || values == 0 {
        return Err(BalanceShareError::EmptyArray);
    }
    if accounts.len() != values {
        return Err(BalanceShareError::ArrayLengthMismatch {
            accounts: accounts.len(),
            values,
        });
    }
    Ok(())
}

/// Validates the whole batch against the current state and computes the net total.
/// Nothing is written unless every update is accepted.
fn plan_updates(
    ctx: &CallContext,
    client: Address,
    share: Option<&BalanceShare>,
    updates: &[AccountShareUpdate],
) -> Result<(Vec<PlannedUpdate>, u16)> {
    if updates.is_empty() {
        return Err(BalanceShareError::EmptyArray);
    }

    let mut total_bps = u32::from(share.map(BalanceShare::total_bps).unwrap_or(0));
    let mut seen = HashSet::with_capacity(updates.len());
    let mut planned = Vec::with_capacity(updates.len());

    for update in updates {
        let account = update.account;
        if account.is_zero() {
            return Err(BalanceShareError::ZeroAddress);
        }
        if !is_valid_bps(update.bps) {
            return Err(BalanceShareError::InvalidBps { bps: update.bps });
        }
        if !seen.insert(account) {
            return Err(BalanceShareError::DuplicateAccount { account });
        }

        let account_share = share.and_then(|share| share.account_share(account));
        let current_bps = account_share.map(|a| a.active_bps()).unwrap_or(0);
        let current_removable_at = account_share.map(|a| a.active_removable_at()).unwrap_or(0);

        if current_bps == 0 && update.bps == 0 {
            return Err(BalanceShareError::AccountShareInactive { account });
        }
        if current_bps == update.bps && current_removable_at == update.removable_at {
            return Err(BalanceShareError::NoOpUpdate { account });
        }

        let is_client = ctx.sender == client;
        let is_account = ctx.sender == account;
        if !is_client {
            if !is_account {
                return Err(BalanceShareError::Unauthorized { caller: ctx.sender });
            }
            if update.bps > current_bps || update.removable_at > current_removable_at {
                return Err(BalanceShareError::AccountShareIncreaseNotAllowed { account });
            }
        }

        let decreasing = current_bps > 0
            && (update.bps < current_bps || update.removable_at < current_removable_at);
        if decreasing && !is_account && ctx.timestamp < current_removable_at {
            return Err(BalanceShareError::AccountShareLocked {
                account,
                removable_at: current_removable_at,
            });
        }

        total_bps = total_bps + u32::from(update.bps) - u32::from(current_bps);
        planned.push(PlannedUpdate {
            update: *update,
            bps_changed: update.bps != current_bps,
        });
    }

    if total_bps > u32::from(MAX_BPS) {
        return Err(BalanceShareError::TotalBpsExceeded { total_bps });
    }

    Ok((planned, total_bps as u16))
}
