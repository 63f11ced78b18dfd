// 18-decimal fixed point as used by Balancer V3 (FixedPoint.sol / ScalingHelpers.sol).
// Products are checked in 256 bits: where the contract would revert we return an error.
use ethers::types::U256;

use super::{log_exp, MathError};

pub const ONE: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);
pub const TWO: U256 = U256([2_000_000_000_000_000_000, 0, 0, 0]);
pub const FOUR: U256 = U256([4_000_000_000_000_000_000, 0, 0, 0]);
/// Relative error bound on `log_exp::pow`, in 1e18 fixed point.
pub const MAX_POW_RELATIVE_ERROR: U256 = U256([10_000, 0, 0, 0]);

fn product(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

pub fn mul_down(a: U256, b: U256) -> Result<U256, MathError> {
    Ok(product(a, b)? / ONE)
}

pub fn mul_up(a: U256, b: U256) -> Result<U256, MathError> {
    let p = product(a, b)?;
    if p.is_zero() {
        return Ok(U256::zero());
    }
    Ok((p - 1) / ONE + 1)
}

pub fn div_down(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    Ok(product(a, ONE)? / b)
}

pub fn div_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    if a.is_zero() {
        return Ok(U256::zero());
    }
    let inflated = product(a, ONE)?;
    Ok((inflated - 1) / b + 1)
}

/// `ceil(a * b / c)` with a 256-bit product.
pub fn mul_div_up(a: U256, b: U256, c: U256) -> Result<U256, MathError> {
    if c.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let p = product(a, b)?;
    if p.is_zero() {
        return Ok(U256::zero());
    }
    Ok((p - 1) / c + 1)
}

/// `1 - x`, clamped at zero.
pub fn complement(x: U256) -> U256 {
    if x < ONE {
        ONE - x
    } else {
        U256::zero()
    }
}

pub fn pow_down(x: U256, y: U256) -> Result<U256, MathError> {
    if y == ONE {
        return Ok(x);
    }
    if y == TWO {
        return mul_down(x, x);
    }
    if y == FOUR {
        let square = mul_down(x, x)?;
        return mul_down(square, square);
    }
    let raw = log_exp::pow(x, y)?;
    let max_error = mul_up(raw, MAX_POW_RELATIVE_ERROR)? + 1;
    if raw < max_error {
        Ok(U256::zero())
    } else {
        Ok(raw - max_error)
    }
}

pub fn pow_up(x: U256, y: U256) -> Result<U256, MathError> {
    if y == ONE {
        return Ok(x);
    }
    if y == TWO {
        return mul_up(x, x);
    }
    if y == FOUR {
        let square = mul_up(x, x)?;
        return mul_up(square, square);
    }
    let raw = log_exp::pow(x, y)?;
    let max_error = mul_up(raw, MAX_POW_RELATIVE_ERROR)? + 1;
    raw.checked_add(max_error).ok_or(MathError::Overflow)
}

pub fn to_scaled18_apply_rate_round_down(
    amount: U256,
    scaling_factor: U256,
    rate: U256,
) -> Result<U256, MathError> {
    mul_down(product(amount, scaling_factor)?, rate)
}

pub fn to_scaled18_apply_rate_round_up(
    amount: U256,
    scaling_factor: U256,
    rate: U256,
) -> Result<U256, MathError> {
    mul_up(product(amount, scaling_factor)?, rate)
}

pub fn to_raw_undo_rate_round_down(
    amount: U256,
    scaling_factor: U256,
    rate: U256,
) -> Result<U256, MathError> {
    div_down(amount, product(scaling_factor, rate)?)
}

pub fn to_raw_undo_rate_round_up(
    amount: U256,
    scaling_factor: U256,
    rate: U256,
) -> Result<U256, MathError> {
    div_up(amount, product(scaling_factor, rate)?)
}

/// Rounds a token rate up when it carries a fractional wei part.
pub fn compute_rate_round_up(rate: U256) -> Result<U256, MathError> {
    if (rate / ONE) * ONE == rate {
        Ok(rate)
    } else {
        rate.checked_add(U256::one()).ok_or(MathError::Overflow)
    }
}
