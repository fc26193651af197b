//! Accrual of incoming balance into a share's current checkpoint.

use crate::{
    bps::{checked_bps_of, max_bps},
    errors::{BalanceShareError, Result},
    events::BalanceShareEvent,
    host::{AssetHost, CallContext},
    ledger::{transfer_failed, BalanceShares},
    storage::{BalanceShare, BalanceSumCheckpoint, MAX_BALANCE_SUM_BALANCE},
    NATIVE_ASSET,
};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationWithRemainder {
    pub amount_to_allocate: U256,
    /// Whether the stored remainder differs from `new_remainder`.
    pub remainder_increased: bool,
    pub new_remainder: U256,
}

/// Ledger state an allocation may touch, captured so a failed pull can be undone.
struct AllocationRollback {
    checkpoint_index: u64,
    checkpoint: BalanceSumCheckpoint,
}

impl AllocationRollback {
    fn capture(share: &BalanceShare) -> Self {
        Self {
            checkpoint_index: share.checkpoint_index,
            checkpoint: share.current_checkpoint().clone(),
        }
    }

    fn restore(self, share: &mut BalanceShare) {
        share.checkpoints.truncate(self.checkpoint_index as usize + 1);
        share.checkpoint_index = self.checkpoint_index;
        *share.current_checkpoint_mut() = self.checkpoint;
    }
}

impl<H: AssetHost> BalanceShares<H> {
    /// Share of `balance_increased_by` owed to the balance share at its current total bps.
    /// The result does not depend on `_asset`; stored remainders are ignored.
    pub fn get_balance_share_allocation(
        &self,
        client: Address,
        balance_share_id: U256,
        _asset: Address,
        balance_increased_by: U256,
    ) -> Result<U256> {
        checked_bps_of(
            balance_increased_by,
            self.balance_share_total_bps(client, balance_share_id),
        )
    }

    /// Like [`Self::get_balance_share_allocation`], carrying the truncated fraction
    /// stored for `asset` into the computation.
    pub fn get_balance_share_allocation_with_remainder(
        &self,
        client: Address,
        balance_share_id: U256,
        asset: Address,
        balance_increased_by: U256,
    ) -> Result<AllocationWithRemainder> {
        let Some(share) = self
            .balance_share(client, balance_share_id)
            .filter(|share| share.total_bps() > 0)
        else {
            return Ok(AllocationWithRemainder::default());
        };

        let checkpoint = share.current_checkpoint();
        let remainder = checkpoint.balance_sum(asset).remainder;
        let scaled = balance_increased_by
            .checked_mul(U256::from(checkpoint.total_bps))
            .and_then(|scaled| scaled.checked_add(remainder))
            .ok_or(BalanceShareError::ArithmeticOverflow)?;

        let new_remainder = scaled % max_bps();
        Ok(AllocationWithRemainder {
            amount_to_allocate: scaled / max_bps(),
            remainder_increased: new_remainder != remainder,
            new_remainder,
        })
    }

    /// Adds `amount` of `asset` to the share and pulls it from the sender.
    #[instrument(
        skip(self, ctx),
        fields(sender = %ctx.sender, client = %client, balance_share_id = %balance_share_id, asset = %asset, amount = %amount)
    )]
    pub fn allocate_to_balance_share(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        asset: Address,
        amount: U256,
    ) -> Result<()> {
        if self.balance_share_total_bps(client, balance_share_id) == 0 {
            return Err(BalanceShareError::BalanceShareInactive);
        }
        validate_attached_value(ctx, asset, amount)?;

        if amount.is_zero() {
            debug!("Nothing to allocate");
            return Ok(());
        }

        self.allocate(ctx, client, balance_share_id, asset, amount, None)
    }

    /// Allocates the sender's own share of `balance_increased_by`, keeping the
    /// truncated fraction for the next call. Returns the amount pulled.
    #[instrument(
        skip(self, ctx),
        fields(sender = %ctx.sender, balance_share_id = %balance_share_id, asset = %asset, balance_increased_by = %balance_increased_by)
    )]
    pub fn allocate_to_balance_share_with_remainder(
        &mut self,
        ctx: &CallContext,
        balance_share_id: U256,
        asset: Address,
        balance_increased_by: U256,
    ) -> Result<U256> {
        let client = ctx.sender;
        if self.balance_share_total_bps(client, balance_share_id) == 0 {
            return Err(BalanceShareError::BalanceShareInactive);
        }

        let allocation = self.get_balance_share_allocation_with_remainder(
            client,
            balance_share_id,
            asset,
            balance_increased_by,
        )?;
        validate_attached_value(ctx, asset, allocation.amount_to_allocate)?;

        let remainder = allocation
            .remainder_increased
            .then_some(allocation.new_remainder);

        if allocation.amount_to_allocate.is_zero() {
            if let Some(remainder) = remainder {
                self.store
                    .balance_share_mut(client, balance_share_id)
                    .current_checkpoint_mut()
                    .balance_sums
                    .entry(asset)
                    .or_default()
                    .remainder = remainder;
            }
            debug!(remainder = ?remainder, "Nothing to allocate");
            return Ok(U256::ZERO);
        }

        self.allocate(
            ctx,
            client,
            balance_share_id,
            asset,
            allocation.amount_to_allocate,
            remainder,
        )?;
        Ok(allocation.amount_to_allocate)
    }

    fn allocate(
        &mut self,
        ctx: &CallContext,
        client: Address,
        balance_share_id: U256,
        asset: Address,
        amount: U256,
        remainder: Option<U256>,
    ) -> Result<()> {
        let share = self.store.balance_share_mut(client, balance_share_id);
        let rollback = AllocationRollback::capture(share);

        accrue_balance(share, asset, amount)?;
        if let Some(remainder) = remainder {
            share
                .current_checkpoint_mut()
                .balance_sums
                .entry(asset)
                .or_default()
                .remainder = remainder;
        }
        let checkpoint_index = share.checkpoint_index;

        if let Err(err) = self.host.receive(asset, ctx.sender, amount) {
            warn!(error = %err, "Allocation transfer failed, restoring checkpoint");
            rollback.restore(self.store.balance_share_mut(client, balance_share_id));
            return Err(transfer_failed(err));
        }

        info!(checkpoint_index, "Allocated to balance share");
        self.emit(BalanceShareEvent::BalanceShareAllocated {
            client,
            balance_share_id,
            asset,
            amount,
            checkpoint_index,
        });
        Ok(())
    }
}

fn validate_attached_value(ctx: &CallContext, asset: Address, amount: U256) -> Result<()> {
    if asset == NATIVE_ASSET {
        if ctx.value != amount {
            return Err(BalanceShareError::InvalidNativeValue {
                expected: amount,
                actual: ctx.value,
            });
        }
    } else if !ctx.value.is_zero() {
        return Err(BalanceShareError::UnexpectedNativeValue { value: ctx.value });
    }
    Ok(())
}

/// Adds `amount` to the current checkpoint, opening new checkpoints with the same
/// total bps whenever the per-asset balance would exceed its ceiling.
fn accrue_balance(share: &mut BalanceShare, asset: Address, amount: U256) -> Result<()> {
    let room = MAX_BALANCE_SUM_BALANCE - share.current_checkpoint().balance(asset);
    if amount > room {
        let overflow = amount - room;
        let extra = overflow.div_ceil(MAX_BALANCE_SUM_BALANCE);
        let extra = u64::try_from(extra).map_err(|_| BalanceShareError::CheckpointIndexOverflow)?;
        share.ensure_checkpoint_capacity(extra)?;
    }

    let mut remaining = amount;
    loop {
        let checkpoint = share.current_checkpoint_mut();
        checkpoint.has_balances = true;
        let total_bps = checkpoint.total_bps;

        let sum = checkpoint.balance_sums.entry(asset).or_default();
        let added = remaining.min(MAX_BALANCE_SUM_BALANCE - sum.balance);
        sum.balance += added;
        remaining -= added;

        if remaining.is_zero() {
            return Ok(());
        }
        share.open_checkpoint(total_bps)?;
    }
}
