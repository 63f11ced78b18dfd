//! Exact integer arithmetic used by every simulator.
//!
//! On-chain math is unsigned/signed 256-bit integer math with truncating division, so nothing in
//! here touches floating point. The only lossy conversion is [`to_decimal`], which exists for
//! display purposes.

pub mod fixed_point;
pub mod log_exp;

use ethers::types::{U256, U512};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("overflow")]
    Overflow,
    #[error("underflow")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} out of bounds")]
    OutOfBounds(&'static str),
}

/// Narrows a wide magnitude into the 256-bit domain.
pub fn narrow(value: U512) -> Result<U256, MathError> {
    U256::try_from(value).map_err(|_| MathError::Overflow)
}

/// `floor(a * b / denominator)` with a 512-bit intermediate product.
pub fn mul_div_down(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    narrow(a.full_mul(b) / U512::from(denominator))
}

/// `ceil(a * b / denominator)` with a 512-bit intermediate product.
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = a.full_mul(b).div_mod(U512::from(denominator));
    let quotient = narrow(quotient)?;
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        quotient.checked_add(U256::one()).ok_or(MathError::Overflow)
    }
}

pub fn checked_add(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

pub fn checked_mul(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

pub fn checked_div(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_div(b).ok_or(MathError::DivisionByZero)
}

/// `10^(18 - decimals)`, the factor that lifts a raw token amount to 18 decimals.
pub fn decimal_scaling_factor(decimals: u8) -> Result<U256, MathError> {
    if decimals > 18 {
        return Err(MathError::OutOfBounds("token decimals"));
    }
    Ok(U256::exp10(18 - decimals as usize))
}

/// Converts a raw token amount into a human-readable decimal.
///
/// Fails with [`MathError::Overflow`] when the value exceeds what `Decimal` can hold
/// (about 7.9e28 before scaling).
pub fn to_decimal(value: U256, decimals: u8) -> Result<Decimal, MathError> {
    let mut decimal = Decimal::from_str(&value.to_string()).map_err(|_| MathError::Overflow)?;
    decimal
        .set_scale(decimals as u32)
        .map_err(|_| MathError::OutOfBounds("decimals"))?;
    Ok(decimal.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        let a = U256::from(10u64);
        let b = U256::from(10u64);
        let d = U256::from(3u64);
        assert_eq!(mul_div_down(a, b, d).unwrap(), U256::from(33u64));
        assert_eq!(mul_div_up(a, b, d).unwrap(), U256::from(34u64));
        assert_eq!(mul_div_up(a, b, U256::from(4u64)).unwrap(), U256::from(25u64));
        assert_eq!(
            mul_div_down(a, b, U256::zero()),
            Err(MathError::DivisionByZero)
        );
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // (2^255 * 4) / 8 fits even though the product does not
        let a = U256::one() << 255;
        let out = mul_div_down(a, U256::from(4u64), U256::from(8u64)).unwrap();
        assert_eq!(out, U256::one() << 254);
        assert_eq!(
            mul_div_down(U256::MAX, U256::MAX, U256::one()),
            Err(MathError::Overflow)
        );
    }

    #[test]
    fn test_narrow() {
        assert_eq!(narrow(U512::from(7u64)).unwrap(), U256::from(7u64));
        let too_big = U512::from(U256::MAX) + U512::one();
        assert_eq!(narrow(too_big), Err(MathError::Overflow));
    }

    #[test]
    fn test_to_decimal() {
        let one_usdc = U256::from(1_500_000u64);
        assert_eq!(to_decimal(one_usdc, 6).unwrap(), Decimal::from_str("1.5").unwrap());
        let one_eth = U256::exp10(18);
        assert_eq!(to_decimal(one_eth, 18).unwrap(), Decimal::ONE);
        assert_eq!(to_decimal(U256::MAX, 18), Err(MathError::Overflow));
    }

    #[test]
    fn test_decimal_scaling_factor() {
        assert_eq!(decimal_scaling_factor(6).unwrap(), U256::exp10(12));
        assert_eq!(decimal_scaling_factor(18).unwrap(), U256::one());
        assert!(decimal_scaling_factor(24).is_err());
    }
}
