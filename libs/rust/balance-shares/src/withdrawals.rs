//! Lazy settlement of account share periods.
//!
//! Nothing is pushed to recipients on allocation. A withdrawal walks the checkpoints
//! between the period's per-asset cursor and the period end, claims the account's
//! bps of every checkpoint's balance growth, and advances the cursor.

use crate::{
    bps::mul_div,
    errors::{BalanceShareError, Result},
    events::BalanceShareEvent,
    host::{AssetHost, CallContext},
    ledger::{transfer_failed, BalanceShares},
    signatures::{recover_signer, WithdrawalPermit},
    storage::{AccountSharePeriod, BalanceShare, BalanceShareStore, WithdrawalCheckpoint},
};
use alloy::primitives::{Address, U256};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

impl<H: AssetHost> BalanceShares<H> {
    pub fn get_account_share_period_withdrawable_balances(
        &self,
        client: Address,
        balance_share_id: U256,
        account: Address,
        assets: &[Address],
        period_index: u64,
    ) -> Result<Vec<U256>> {
        let (amounts, _) =
            self.withdrawable_balances(client, balance_share_id, account, assets, period_index)?;
        Ok(amounts)
    }

    /// Settlement cursor of one period for `asset`.
    pub fn withdrawal_checkpoint(
        &self,
        client: Address,
        balance_share_id: U256,
        account: Address,
        period_index: u64,
        asset: Address,
    ) -> WithdrawalCheckpoint {
        self.account_share_period(client, balance_share_id, account, period_index)
            .map(|period| period.withdrawal_checkpoint(asset))
            .unwrap_or_default()
    }

    /// Pays the sender's claim on one of its periods to `receiver`.
    #[instrument(
        skip(self, ctx, assets),
        fields(account = %ctx.sender, client = %client, balance_share_id = %balance_share_id, receiver = %receiver)
    )]
    pub fn withdraw_account_share_period_to(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        receiver: Address,
        assets: &[Address],
        period_index: u64,
    ) -> Result<Vec<U256>> {
        self.settle_account_share_period(
            client,
            balance_share_id,
            ctx.sender,
            receiver,
            assets,
            period_index,
        )
    }

    /// Settles a period on behalf of `permit.account`, authorized by its EIP-712
    /// signature (ECDSA for plain accounts, EIP-1271 for contract accounts).
    #[instrument(
        skip(self, ctx, permit, signature),
        fields(sender = %ctx.sender, account = %permit.account, client = %permit.client, nonce = %permit.nonce)
    )]
    pub fn withdraw_account_share_period_to_by_sig(
        &mut self,
        ctx: &CallContext,
        permit: &WithdrawalPermit,
        signature: &[u8],
    ) -> Result<Vec<U256>> {
        if ctx.timestamp > permit.deadline {
            return Err(BalanceShareError::SignatureExpired {
                deadline: permit.deadline,
            });
        }

        let account = permit.account;
        let expected_nonce = self.store.nonce(account);
        if permit.nonce != expected_nonce {
            warn!(expected = %expected_nonce, "Stale withdrawal permit nonce");
            return Err(BalanceShareError::InvalidSignature);
        }

        let hash = permit.signing_hash(self.domain());
        let valid = if self.host.is_contract(account) {
            self.host.is_valid_signature(account, hash, signature)
        } else {
            recover_signer(&hash, signature) == Some(account)
        };
        if !valid {
            return Err(BalanceShareError::InvalidSignature);
        }

        let amounts = self.settle_account_share_period(
            permit.client,
            permit.balance_share_id,
            account,
            permit.receiver,
            &permit.assets,
            permit.period_index,
        )?;
        self.store.use_nonce(account);
        Ok(amounts)
    }

    fn withdrawable_balances(
        &self,
        client: Address,
        balance_share_id: U256,
        account: Address,
        assets: &[Address],
        period_index: u64,
    ) -> Result<(Vec<U256>, Vec<WithdrawalCheckpoint>)> {
        if assets.is_empty() {
            return Err(BalanceShareError::EmptyArray);
        }

        let share = self
            .balance_share(client, balance_share_id)
            .ok_or(BalanceShareError::AccountShareNotFound { account })?;
        let period = lookup_period(share, account, period_index)?;

        let mut amounts = Vec::with_capacity(assets.len());
        let mut cursors = Vec::with_capacity(assets.len());
        for &asset in assets {
            let (amount, cursor) = walk_checkpoints(share, period, asset)?;
            amounts.push(amount);
            cursors.push(cursor);
        }
        Ok((amounts, cursors))
    }

    fn settle_account_share_period(
        &mut self,
        client: Address,
        balance_share_id: U256,
        account: Address,
        receiver: Address,
        assets: &[Address],
        period_index: u64,
    ) -> Result<Vec<U256>> {
        if receiver.is_zero() {
            return Err(BalanceShareError::ZeroAddress);
        }
        let mut seen = HashSet::with_capacity(assets.len());
        if let Some(&asset) = assets.iter().find(|asset| !seen.insert(**asset)) {
            return Err(BalanceShareError::DuplicateAsset { asset });
        }

        let (amounts, cursors) =
            self.withdrawable_balances(client, balance_share_id, account, assets, period_index)?;

        let period = stored_period_mut(&mut self.store, client, balance_share_id, account, period_index)?;
        let previous: Vec<Option<WithdrawalCheckpoint>> = assets
            .iter()
            .zip(&cursors)
            .map(|(asset, cursor)| period.withdrawal_checkpoints.insert(*asset, *cursor))
            .collect();

        let payouts: Vec<(Address, U256)> = assets
            .iter()
            .copied()
            .zip(amounts.iter().copied())
            .filter(|(_, amount)| !amount.is_zero())
            .collect();

        if !payouts.is_empty() {
            if let Err(err) = self.host.send(receiver, &payouts) {
                warn!(error = %err, "Withdrawal transfer failed, restoring cursors");
                let period =
                    stored_period_mut(&mut self.store, client, balance_share_id, account, period_index)?;
                for (asset, cursor) in assets.iter().zip(previous) {
                    match cursor {
                        Some(cursor) => period.withdrawal_checkpoints.insert(*asset, cursor),
                        None => period.withdrawal_checkpoints.remove(asset),
                    };
                }
                return Err(transfer_failed(err));
            }
        }

        info!(
            account = %account,
            period_index,
            paid_assets = payouts.len(),
            "Account share period withdrawn"
        );
        for (asset, amount) in payouts {
            self.emit(BalanceShareEvent::AccountSharePeriodWithdrawal {
                client,
                balance_share_id,
                account,
                receiver,
                asset,
                period_index,
                amount,
            });
        }
        Ok(amounts)
    }
}

fn lookup_period(share: &BalanceShare, account: Address, period_index: u64) -> Result<&AccountSharePeriod> {
    let account_share = share
        .account_share(account)
        .ok_or(BalanceShareError::AccountShareNotFound { account })?;
    let max_period_index = account_share
        .period_index()
        .ok_or(BalanceShareError::AccountShareNotFound { account })?;
    if period_index > max_period_index {
        return Err(BalanceShareError::PeriodIndexOutOfBounds {
            period_index,
            max_period_index,
        });
    }
    account_share
        .period(period_index)
        .ok_or(BalanceShareError::AccountShareNotFound { account })
}

fn stored_period_mut(
    store: &mut BalanceShareStore,
    client: Address,
    balance_share_id: U256,
    account: Address,
    period_index: u64,
) -> Result<&mut AccountSharePeriod> {
    store
        .balance_share_mut(client, balance_share_id)
        .accounts
        .get_mut(&account)
        .and_then(|account_share| account_share.period_mut(period_index))
        .ok_or(BalanceShareError::AccountShareNotFound { account })
}

/// Claim of `period` on `asset` since its cursor, and the cursor after claiming.
fn walk_checkpoints(
    share: &BalanceShare,
    period: &AccountSharePeriod,
    asset: Address,
) -> Result<(U256, WithdrawalCheckpoint)> {
    let cursor = period.withdrawal_checkpoint(asset);
    if period.bps == 0 {
        return Ok((U256::ZERO, cursor));
    }

    let end = period.end_checkpoint_index.min(share.checkpoint_index + 1);
    let start = cursor.current_checkpoint_index.max(period.start_checkpoint_index);
    if start >= end {
        return Ok((U256::ZERO, cursor));
    }

    let bps = U256::from(period.bps);
    let mut previous = if cursor.current_checkpoint_index >= period.start_checkpoint_index {
        cursor.previous_balance_at_withdrawal
    } else {
        U256::ZERO
    };

    let mut amount = U256::ZERO;
    let mut balance = U256::ZERO;
    for index in start..end {
        let checkpoint = share
            .checkpoint(index)
            .ok_or(BalanceShareError::CheckpointIndexOverflow)?;
        balance = checkpoint.balance(asset);

        if checkpoint.total_bps > 0 && balance > previous {
            let total_bps = U256::from(checkpoint.total_bps);
            let claimed = mul_div(balance, bps, total_bps)? - mul_div(previous, bps, total_bps)?;
            amount = amount
                .checked_add(claimed)
                .ok_or(BalanceShareError::ArithmeticOverflow)?;
        }
        previous = U256::ZERO;
    }

    let next = if end == period.end_checkpoint_index {
        WithdrawalCheckpoint {
            current_checkpoint_index: end,
            previous_balance_at_withdrawal: U256::ZERO,
        }
    } else {
        WithdrawalCheckpoint {
            current_checkpoint_index: end - 1,
            previous_balance_at_withdrawal: balance,
        }
    };

    debug!(asset = %asset, from = start, to = end, amount = %amount, "Walked checkpoints");
    Ok((amount, next))
}
