use crate::errors::{BalanceShareError, Result};
use alloy::primitives::U256;

/// 100% expressed in basis points.
pub const MAX_BPS: u16 = 10_000;

pub(crate) fn max_bps() -> U256 {
    U256::from(MAX_BPS)
}

/// `value * bps / 10000`, wrapping on overflow. Only for values known to fit.
pub fn bps_of(value: U256, bps: u16) -> U256 {
    value.wrapping_mul(U256::from(bps)) / max_bps()
}

/// `value * bps / 10000`, rejecting overflow of the intermediate product.
pub fn checked_bps_of(value: U256, bps: u16) -> Result<U256> {
    mul_div(value, U256::from(bps), max_bps())
}

/// `value * numerator / denominator` with truncating division.
pub fn mul_div(value: U256, numerator: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(BalanceShareError::ArithmeticOverflow);
    }
    value
        .checked_mul(numerator)
        .map(|product| product / denominator)
        .ok_or(BalanceShareError::ArithmeticOverflow)
}

pub fn is_valid_bps(bps: u16) -> bool {
    bps <= MAX_BPS
}
