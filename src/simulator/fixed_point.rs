//! Fixed-Point Arithmetic
//!
//! 18-decimal unsigned helpers (vault scaling, fees, rates) and the signed
//! helpers used by the E-CLP math, including the 38-decimal "extra
//! precision" (xp) variants. Every operation is checked: an intermediate
//! that would revert on-chain is a `MathError` here.
//!
//! Signed division truncates toward zero and `%` takes the sign of the
//! dividend, matching EVM `sdiv`/`smod`.
//!
//! Author: AI-Generated
//! Created: 2026-02-16

use crate::error::MathError;
use alloy::primitives::{I256, U256};

// ── Constants ────────────────────────────────────────────────────────────────

/// 1.0 in 18-decimal fixed point
pub const ONE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 1.0 in 18-decimal fixed point, signed
pub const ONE_I: I256 = I256::from_raw(ONE);

/// 1.0 in 38-decimal extra precision
pub const ONE_XP: I256 = I256::from_raw(U256::from_limbs([687_399_551_400_673_280, 5_421_010_862_427_522_170, 0, 0]));

const E19: I256 = I256::from_raw(U256::from_limbs([10_000_000_000_000_000_000, 0, 0, 0]));

// ── Unsigned (18 decimals) ───────────────────────────────────────────────────

pub fn mul_down(a: U256, b: U256) -> Result<U256, MathError> {
    Ok(a.checked_mul(b).ok_or(MathError::Overflow)? / ONE)
}

pub fn mul_up(a: U256, b: U256) -> Result<U256, MathError> {
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    if product.is_zero() {
        return Ok(U256::ZERO);
    }
    Ok((product - U256::from(1)) / ONE + U256::from(1))
}

pub fn div_down(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::ZeroDivision);
    }
    Ok(a.checked_mul(ONE).ok_or(MathError::Overflow)? / b)
}

pub fn div_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::ZeroDivision);
    }
    if a.is_zero() {
        return Ok(U256::ZERO);
    }
    let scaled = a.checked_mul(ONE).ok_or(MathError::Overflow)?;
    Ok((scaled - U256::from(1)) / b + U256::from(1))
}

/// 1 - x, floored at zero
pub fn complement(x: U256) -> U256 {
    if x < ONE {
        ONE - x
    } else {
        U256::ZERO
    }
}

/// Rate rounded up to the next 1e-18 unless it is a whole number
pub fn rate_round_up(rate: U256) -> Result<U256, MathError> {
    if (rate % ONE).is_zero() {
        Ok(rate)
    } else {
        rate.checked_add(U256::from(1)).ok_or(MathError::Overflow)
    }
}

// ── Signed primitives ────────────────────────────────────────────────────────

pub fn add(a: I256, b: I256) -> Result<I256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn sub(a: I256, b: I256) -> Result<I256, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}

pub fn mul(a: I256, b: I256) -> Result<I256, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

pub fn div(a: I256, b: I256) -> Result<I256, MathError> {
    if b.is_zero() {
        return Err(MathError::ZeroDivision);
    }
    a.checked_div(b).ok_or(MathError::Overflow)
}

fn rem(a: I256, b: I256) -> Result<I256, MathError> {
    if b.is_zero() {
        return Err(MathError::ZeroDivision);
    }
    a.checked_rem(b).ok_or(MathError::Overflow)
}

pub fn neg(a: I256) -> Result<I256, MathError> {
    a.checked_neg().ok_or(MathError::Overflow)
}

pub fn int(value: u128) -> I256 {
    I256::from_raw(U256::from(value))
}

pub fn to_signed(value: U256) -> Result<I256, MathError> {
    I256::try_from(value).map_err(|_| MathError::Overflow)
}

/// Non-negative signed value back to U256
pub fn to_unsigned(value: I256) -> Result<U256, MathError> {
    if value.is_negative() {
        return Err(MathError::Underflow);
    }
    Ok(value.into_raw())
}

// ── Signed 18-decimal (magnitude rounding) ───────────────────────────────────
//
// "Up"/"down" round the magnitude: up moves away from zero, down toward it.

pub fn mul_down_mag(a: I256, b: I256) -> Result<I256, MathError> {
    div(mul(a, b)?, ONE_I)
}

pub fn mul_up_mag(a: I256, b: I256) -> Result<I256, MathError> {
    let product = mul(a, b)?;
    if product.is_positive() {
        add(div(sub(product, I256::ONE)?, ONE_I)?, I256::ONE)
    } else if product.is_negative() {
        sub(div(add(product, I256::ONE)?, ONE_I)?, I256::ONE)
    } else {
        Ok(I256::ZERO)
    }
}

pub fn div_down_mag(a: I256, b: I256) -> Result<I256, MathError> {
    div(mul(a, ONE_I)?, b)
}

pub fn div_up_mag(a: I256, b: I256) -> Result<I256, MathError> {
    if b.is_zero() {
        return Err(MathError::ZeroDivision);
    }
    let (a, b) = if b.is_negative() { (neg(a)?, neg(b)?) } else { (a, b) };
    if a.is_zero() {
        return Ok(I256::ZERO);
    }
    let scaled = mul(a, ONE_I)?;
    if a.is_positive() {
        add(div(sub(scaled, I256::ONE)?, b)?, I256::ONE)
    } else {
        sub(div(add(scaled, I256::ONE)?, b)?, I256::ONE)
    }
}

// ── Signed extra precision (38 decimals) ─────────────────────────────────────

pub fn mul_xp(a: I256, b: I256) -> Result<I256, MathError> {
    div(mul(a, b)?, ONE_XP)
}

pub fn div_xp(a: I256, b: I256) -> Result<I256, MathError> {
    div(mul(a, ONE_XP)?, b)
}

/// `a` (18 decimals) times `b` (38 decimals), rounded down, 18 decimals out.
/// `b` is split at 1e19 so neither partial product overflows.
pub fn mul_down_xp_to_np(a: I256, b: I256) -> Result<I256, MathError> {
    let b1 = div(b, E19)?;
    let b2 = rem(b, E19)?;
    let prod1 = mul(a, b1)?;
    let prod2 = mul(a, b2)?;
    let sum = add(prod1, div(prod2, E19)?)?;
    if !prod1.is_negative() && !prod2.is_negative() {
        div(sum, E19)
    } else {
        sub(div(add(sum, I256::ONE)?, E19)?, I256::ONE)
    }
}

/// Same as `mul_down_xp_to_np` with the magnitude rounded up
pub fn mul_up_xp_to_np(a: I256, b: I256) -> Result<I256, MathError> {
    let b1 = div(b, E19)?;
    let b2 = rem(b, E19)?;
    let prod1 = mul(a, b1)?;
    let prod2 = mul(a, b2)?;
    let sum = add(prod1, div(prod2, E19)?)?;
    if !prod1.is_positive() && !prod2.is_positive() {
        div(sum, E19)
    } else {
        add(div(sub(sum, I256::ONE)?, E19)?, I256::ONE)
    }
}

// ── Square root ──────────────────────────────────────────────────────────────

/// Initial guesses below 1.0: (upper bound of input, sqrt of that bound)
const SMALL_GUESSES: [(u64, u64); 17] = [
    (10, 3_162_277_660),
    (100, 10_000_000_000),
    (1_000, 31_622_776_601),
    (10_000, 100_000_000_000),
    (100_000, 316_227_766_016),
    (1_000_000, 1_000_000_000_000),
    (10_000_000, 3_162_277_660_168),
    (100_000_000, 10_000_000_000_000),
    (1_000_000_000, 31_622_776_601_683),
    (10_000_000_000, 100_000_000_000_000),
    (100_000_000_000, 316_227_766_016_837),
    (1_000_000_000_000, 1_000_000_000_000_000),
    (10_000_000_000_000, 3_162_277_660_168_379),
    (100_000_000_000_000, 10_000_000_000_000_000),
    (1_000_000_000_000_000, 31_622_776_601_683_793),
    (10_000_000_000_000_000, 100_000_000_000_000_000),
    (100_000_000_000_000_000, 316_227_766_016_837_933),
];

const NEWTON_ITERATIONS: usize = 7;

/// floor(log2(x) / 2)
fn int_log2_halved(mut x: U256) -> usize {
    let mut n = 0;
    for (shift, increment) in [(128usize, 64usize), (64, 32), (32, 16), (16, 8), (8, 4), (4, 2), (2, 1)] {
        if x >= U256::from(1) << shift {
            x >>= shift;
            n += increment;
        }
    }
    n
}

fn initial_guess(input: U256) -> Result<U256, MathError> {
    if input >= ONE {
        let exponent = int_log2_halved(input / ONE);
        return (U256::from(1) << exponent).checked_mul(ONE).ok_or(MathError::Overflow);
    }
    Ok(SMALL_GUESSES
        .iter()
        .find(|(bound, _)| input <= U256::from(*bound))
        .map(|(_, guess)| U256::from(*guess))
        .unwrap_or(input))
}

/// Square root of an 18-decimal value by a fixed number of Newton steps.
/// The result is checked against `tolerance` (in 1e-18 units of the guess).
pub fn sqrt(input: U256, tolerance: U256) -> Result<U256, MathError> {
    if input.is_zero() {
        return Ok(U256::ZERO);
    }
    let scaled = input.checked_mul(ONE).ok_or(MathError::Overflow)?;
    let mut guess = initial_guess(input)?;
    for _ in 0..NEWTON_ITERATIONS {
        if guess.is_zero() {
            return Err(MathError::ZeroDivision);
        }
        guess = guess.checked_add(scaled / guess).ok_or(MathError::Overflow)? / U256::from(2);
    }

    let squared = mul_down(guess, guess)?;
    let margin = mul_up(guess, tolerance)?;
    let upper = input.checked_add(margin).ok_or(MathError::Overflow)?;
    let lower = input.checked_sub(margin).ok_or(MathError::Underflow)?;
    if squared > upper || squared < lower {
        return Err(MathError::SqrtFailed);
    }
    Ok(guess)
}

/// `sqrt` for signed operands that are known to be positive
pub fn sqrt_signed(input: I256, tolerance: u64) -> Result<I256, MathError> {
    to_signed(sqrt(to_unsigned(input)?, U256::from(tolerance))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i(v: i128) -> I256 {
        I256::try_from(v).unwrap()
    }

    #[test]
    fn test_constants() {
        assert_eq!(ONE_XP, "100000000000000000000000000000000000000".parse::<I256>().unwrap());
        assert_eq!(E19, int(10_000_000_000_000_000_000));
        assert_eq!(ONE_I, int(1_000_000_000_000_000_000));
    }

    #[test]
    fn test_unsigned_rounding() {
        let third = U256::from(333_333_333_333_333_333u64);
        assert_eq!(mul_down(third, U256::from(3)).unwrap(), U256::ZERO);
        assert_eq!(mul_up(third, U256::from(3)).unwrap(), U256::from(1));
        assert_eq!(div_down(U256::from(1), U256::from(3)).unwrap(), third);
        assert_eq!(div_up(U256::from(1), U256::from(3)).unwrap(), third + U256::from(1));
        assert_eq!(div_up(U256::ZERO, U256::from(3)).unwrap(), U256::ZERO);
        assert_eq!(div_down(U256::from(1), U256::ZERO), Err(MathError::ZeroDivision));
    }

    #[test]
    fn test_complement_and_rate() {
        assert_eq!(complement(U256::from(1_000_000_000_000_000u64)), U256::from(999_000_000_000_000_000u64));
        assert_eq!(complement(ONE + U256::from(1)), U256::ZERO);
        assert_eq!(rate_round_up(ONE).unwrap(), ONE);
        assert_eq!(rate_round_up(ONE + U256::from(5)).unwrap(), ONE + U256::from(6));
    }

    #[test]
    fn test_signed_magnitude_rounding() {
        // 1.5e-18 rounds to 1 or 2 in magnitude, symmetric around zero
        let a = i(3);
        let half = i(500_000_000_000_000_000);
        assert_eq!(mul_down_mag(a, half).unwrap(), i(1));
        assert_eq!(mul_up_mag(a, half).unwrap(), i(2));
        assert_eq!(mul_down_mag(-a, half).unwrap(), i(-1));
        assert_eq!(mul_up_mag(-a, half).unwrap(), i(-2));

        assert_eq!(div_up_mag(i(1), i(3)).unwrap(), i(333_333_333_333_333_334));
        assert_eq!(div_up_mag(i(1), i(-3)).unwrap(), i(-333_333_333_333_333_334));
        assert_eq!(div_down_mag(i(-1), i(3)).unwrap(), i(-333_333_333_333_333_333));
    }

    #[test]
    fn test_xp_to_np() {
        // 2.5 * 0.5 (xp) = 1.25
        let a = i(2_500_000_000_000_000_000);
        let b = div(ONE_XP, i(2)).unwrap();
        assert_eq!(mul_down_xp_to_np(a, b).unwrap(), i(1_250_000_000_000_000_000));
        assert_eq!(mul_up_xp_to_np(a, b).unwrap(), i(1_250_000_000_000_000_000));

        // 1e-18 * (1/3) rounds to 0 down and 1 up in magnitude
        let third = div(ONE_XP, i(3)).unwrap();
        assert_eq!(mul_down_xp_to_np(i(1), third).unwrap(), I256::ZERO);
        assert_eq!(mul_up_xp_to_np(i(1), third).unwrap(), i(1));
        assert_eq!(mul_down_xp_to_np(i(-1), third).unwrap(), i(-1));
        assert_eq!(mul_up_xp_to_np(i(-1), third).unwrap(), I256::ZERO);
    }

    #[test]
    fn test_signed_overflow_is_error() {
        assert_eq!(mul(I256::MAX, i(2)), Err(MathError::Overflow));
        assert_eq!(div(i(1), I256::ZERO), Err(MathError::ZeroDivision));
        assert_eq!(to_unsigned(i(-1)), Err(MathError::Underflow));
    }

    #[test]
    fn test_sqrt() {
        let two = U256::from(2) * ONE;
        let five = U256::from(5);
        assert_eq!(sqrt(two, five).unwrap(), U256::from(1_414_213_562_373_095_048u64));
        assert_eq!(sqrt(U256::from(4) * ONE, five).unwrap(), U256::from(2) * ONE);
        assert_eq!(sqrt(U256::from(1_000_000_000_000u64), five).unwrap(), U256::from(1_000_000_000_000_000u64));
        assert_eq!(sqrt(U256::ZERO, five).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_int_log2_halved() {
        assert_eq!(int_log2_halved(U256::from(1)), 0);
        assert_eq!(int_log2_halved(U256::from(4)), 1);
        assert_eq!(int_log2_halved(U256::from(1u64 << 40)), 20);
    }
}
