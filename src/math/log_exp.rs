//! Natural exponent and logarithm in signed 18-decimal fixed point.
//!
//! Bit-exact with Balancer's `LogExpMath.sol`: every intermediate uses the same evaluation order
//! and truncating signed division, so `pow` returns the same wei as the contract. Results carry a
//! relative error below 1e-14, which is why `fixed_point::pow_up` / `pow_down` pad them.

use ethers::types::{I256, U256};
use once_cell::sync::Lazy;

use super::MathError;

struct Constants {
    one_18: I256,
    one_20: I256,
    one_36: I256,
    max_natural_exponent: I256,
    min_natural_exponent: I256,
    ln_36_lower_bound: I256,
    ln_36_upper_bound: I256,
    mild_exponent_bound: U256,
    x0: I256,
    a0: I256,
    x1: I256,
    a1: I256,
    // (x_n, a_n) for n = 2..=11, 20 decimals
    steps: Vec<(I256, I256)>,
}

fn int(value: &str) -> I256 {
    // Only called on the literal table below.
    I256::from_dec_str(value).unwrap_or_else(|_| panic!("invalid LogExpMath constant {value}"))
}

static C: Lazy<Constants> = Lazy::new(|| {
    let one_18 = int("1000000000000000000");
    let one_20 = int("100000000000000000000");
    Constants {
        one_18,
        one_20,
        one_36: int("1000000000000000000000000000000000000"),
        max_natural_exponent: int("130000000000000000000"),
        min_natural_exponent: int("-41000000000000000000"),
        ln_36_lower_bound: one_18 - int("100000000000000000"),
        ln_36_upper_bound: one_18 + int("100000000000000000"),
        mild_exponent_bound: (U256::one() << 254) / U256::exp10(20),
        x0: int("128000000000000000000"),
        a0: int("38877084059945950922200000000000000000000000000000000000"),
        x1: int("64000000000000000000"),
        a1: int("6235149080811616882910000000"),
        steps: vec![
            (int("3200000000000000000000"), int("7896296018268069516100000000000000")),
            (int("1600000000000000000000"), int("888611052050787263676000000")),
            (int("800000000000000000000"), int("298095798704172827474000")),
            (int("400000000000000000000"), int("5459815003314423907810")),
            (int("200000000000000000000"), int("738905609893065022723")),
            (int("100000000000000000000"), int("271828182845904523536")),
            (int("50000000000000000000"), int("164872127070012814685")),
            (int("25000000000000000000"), int("128402541668774148407")),
            (int("12500000000000000000"), int("113314845306682631683")),
            (int("6250000000000000000"), int("106449445891785942956")),
        ],
    }
});

/// `x^y` for unsigned 18-decimal inputs.
pub fn pow(x: U256, y: U256) -> Result<U256, MathError> {
    let c = &*C;
    if y.is_zero() {
        return Ok(c.one_18.into_raw());
    }
    if x.is_zero() {
        return Ok(U256::zero());
    }
    if x.bit(255) {
        return Err(MathError::OutOfBounds("base"));
    }
    if y >= c.mild_exponent_bound {
        return Err(MathError::OutOfBounds("exponent"));
    }
    let x_int = I256::from_raw(x);
    let y_int = I256::from_raw(y);

    let mut logx_times_y = if c.ln_36_lower_bound < x_int && x_int < c.ln_36_upper_bound {
        let ln_36_x = ln_36(x_int);
        // ln_36_x has 36 decimals; split it to keep the product within 256 bits
        (ln_36_x / c.one_18) * y_int + ((ln_36_x % c.one_18) * y_int) / c.one_18
    } else {
        ln(x_int)? * y_int
    };
    logx_times_y = logx_times_y / c.one_18;

    if logx_times_y < c.min_natural_exponent || logx_times_y > c.max_natural_exponent {
        return Err(MathError::OutOfBounds("product"));
    }
    Ok(exp(logx_times_y)?.into_raw())
}

/// `e^x` for a signed 18-decimal exponent in `[-41, 130]`.
pub fn exp(x: I256) -> Result<I256, MathError> {
    let c = &*C;
    if x < c.min_natural_exponent || x > c.max_natural_exponent {
        return Err(MathError::OutOfBounds("exponent"));
    }
    if x.is_negative() {
        // e^-x == 1 / e^x; 36 decimals in the numerator keep 18 in the result
        return Ok((c.one_18 * c.one_18) / exp(-x)?);
    }

    let mut x = x;
    let first_an = if x >= c.x0 {
        x = x - c.x0;
        c.a0
    } else if x >= c.x1 {
        x = x - c.x1;
        c.a1
    } else {
        I256::from(1)
    };

    // switch to 20 decimals
    x = x * I256::from(100);

    let mut product = c.one_20;
    for (xn, an) in c.steps.iter().take(8) {
        if x >= *xn {
            x = x - *xn;
            product = (product * *an) / c.one_20;
        }
    }

    // Taylor series for the remainder, which is now below x9
    let mut series_sum = c.one_20;
    let mut term = x;
    series_sum = series_sum + term;
    for i in 2..=12 {
        term = ((term * x) / c.one_20) / I256::from(i);
        series_sum = series_sum + term;
    }

    Ok((((product * series_sum) / c.one_20) * first_an) / I256::from(100))
}

/// Natural logarithm of a positive 18-decimal value.
pub fn ln(a: I256) -> Result<I256, MathError> {
    let c = &*C;
    if a <= I256::from(0) {
        return Err(MathError::OutOfBounds("logarithm argument"));
    }
    if a < c.one_18 {
        // ln(a) == -ln(1/a)
        return Ok(-ln((c.one_18 * c.one_18) / a)?);
    }

    let mut a = a;
    let mut sum = I256::from(0);
    if a >= c.a0 * c.one_18 {
        a = a / c.a0;
        sum = sum + c.x0;
    }
    if a >= c.a1 * c.one_18 {
        a = a / c.a1;
        sum = sum + c.x1;
    }

    sum = sum * I256::from(100);
    a = a * I256::from(100);

    for (xn, an) in c.steps.iter() {
        if a >= *an {
            a = (a * c.one_20) / *an;
            sum = sum + *xn;
        }
    }

    let z = ((a - c.one_20) * c.one_20) / (a + c.one_20);
    let z_squared = (z * z) / c.one_20;
    let mut num = z;
    let mut series_sum = num;
    for d in [3, 5, 7, 9, 11] {
        num = (num * z_squared) / c.one_20;
        series_sum = series_sum + num / I256::from(d);
    }
    series_sum = series_sum * I256::from(2);

    Ok((sum + series_sum) / I256::from(100))
}

// High precision ln for arguments close to one; result has 36 decimals.
fn ln_36(x: I256) -> I256 {
    let c = &*C;
    let x = x * c.one_18;
    let z = ((x - c.one_36) * c.one_36) / (x + c.one_36);
    let z_squared = (z * z) / c.one_36;
    let mut num = z;
    let mut series_sum = num;
    for d in [3, 5, 7, 9, 11, 13, 15] {
        num = (num * z_squared) / c.one_36;
        series_sum = series_sum + num / I256::from(d);
    }
    series_sum * I256::from(2)
}
