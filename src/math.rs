//! Full-precision U256 helpers
//!
//! Products are taken in 512 bits and narrowed back with an explicit
//! overflow check, matching EVM `mulDiv` semantics.

use crate::error::MathError;
use alloy::primitives::{U256, U512};

/// Narrow a 512-bit value, `None` if any high limb is set
pub fn narrow(value: U512) -> Option<U256> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|&limb| limb != 0) {
        return None;
    }
    Some(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// floor(a * b / c)
pub fn mul_div_down(a: U256, b: U256, c: U256) -> Result<U256, MathError> {
    if c.is_zero() {
        return Err(MathError::ZeroDivision);
    }
    let product: U512 = a.widening_mul(b);
    narrow(product / U512::from(c)).ok_or(MathError::MulDivOverflow)
}

/// ceil(a * b / c)
pub fn mul_div_up(a: U256, b: U256, c: U256) -> Result<U256, MathError> {
    if c.is_zero() {
        return Err(MathError::ZeroDivision);
    }
    let product: U512 = a.widening_mul(b);
    let divisor = U512::from(c);
    let mut quotient = product / divisor;
    if !(product % divisor).is_zero() {
        quotient += U512::from(1u8);
    }
    narrow(quotient).ok_or(MathError::MulDivOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_uses_full_width_product() {
        // MAX * 2 overflows 256 bits but the quotient fits
        let result = mul_div_down(U256::MAX, U256::from(2), U256::from(4)).unwrap();
        assert_eq!(result, U256::MAX >> 1);
    }

    #[test]
    fn test_mul_div_rounding() {
        let a = U256::from(10);
        let b = U256::from(10);
        let c = U256::from(3);
        assert_eq!(mul_div_down(a, b, c).unwrap(), U256::from(33));
        assert_eq!(mul_div_up(a, b, c).unwrap(), U256::from(34));
        assert_eq!(mul_div_up(a, b, U256::from(4)).unwrap(), U256::from(25));
    }

    #[test]
    fn test_mul_div_overflow_and_zero_divisor() {
        assert_eq!(
            mul_div_down(U256::MAX, U256::MAX, U256::from(1)),
            Err(MathError::MulDivOverflow)
        );
        assert_eq!(
            mul_div_down(U256::from(1), U256::from(1), U256::ZERO),
            Err(MathError::ZeroDivision)
        );
    }
}
