// Weighted pool invariant math (WeightedMath.sol), on 18-decimal live balances.
use ethers::types::U256;

use crate::error::PoolError;
use crate::math::fixed_point::{self, ONE};

/// Swaps may not move more than 30% of a balance.
pub const MAX_IN_RATIO: U256 = U256([300_000_000_000_000_000, 0, 0, 0]);
pub const MAX_OUT_RATIO: U256 = U256([300_000_000_000_000_000, 0, 0, 0]);

/// `aO = bO * (1 - (bI / (bI + aI)) ^ (wI / wO))`
pub fn compute_out_given_exact_in(
    balance_in: U256,
    weight_in: U256,
    balance_out: U256,
    weight_out: U256,
    amount_in: U256,
) -> Result<U256, PoolError> {
    if amount_in > fixed_point::mul_down(balance_in, MAX_IN_RATIO)? {
        return Err(PoolError::MaxInRatio);
    }

    let denominator = balance_in.checked_add(amount_in).ok_or(PoolError::Overflow)?;
    let base = fixed_point::div_up(balance_in, denominator)?;
    let exponent = fixed_point::div_down(weight_in, weight_out)?;
    let power = fixed_point::pow_up(base, exponent)?;

    // rounding the power up rounds the complement, and the output, down
    Ok(fixed_point::mul_down(balance_out, fixed_point::complement(power))?)
}

/// `aI = bI * ((bO / (bO - aO)) ^ (wO / wI) - 1)`
pub fn compute_in_given_exact_out(
    balance_in: U256,
    weight_in: U256,
    balance_out: U256,
    weight_out: U256,
    amount_out: U256,
) -> Result<U256, PoolError> {
    if amount_out > fixed_point::mul_down(balance_out, MAX_OUT_RATIO)? {
        return Err(PoolError::MaxOutRatio);
    }

    let remaining = balance_out
        .checked_sub(amount_out)
        .ok_or(PoolError::InsufficientLiquidity)?;
    let base = fixed_point::div_up(balance_out, remaining)?;
    let exponent = fixed_point::div_up(weight_out, weight_in)?;
    let power = fixed_point::pow_up(base, exponent)?;
    let ratio = power.checked_sub(ONE).ok_or(PoolError::InsufficientLiquidity)?;

    Ok(fixed_point::mul_up(balance_in, ratio)?)
}
