//! Snapshot Decoder
//!
//! Turns packed on-chain encodings into canonical quantities.
//! Bit-exact with the EVM's checked 256-bit arithmetic: products are
//! taken in 512 bits, results that do not fit are errors.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use crate::error::MathError;
use crate::math::{mul_div_down, narrow};
use crate::types::{RawVaultState, VaultSnapshot};
use alloy::primitives::{U256, U512};

/// Virtual deposit added to both sides of the share price (EVK `VIRTUAL_DEPOSIT_AMOUNT`)
pub const VIRTUAL_DEPOSIT_AMOUNT: U256 = U256::from_limbs([1_000_000, 0, 0, 0]);

/// Low 6 bits hold the base-10 exponent
const CAP_EXPONENT_MASK: u64 = 63;

/// Decode an EVK packed cap: `[ mantissa | exponent:6 ]` → `10^exponent * mantissa / 100`.
///
/// `0` means "no cap" and decodes to `U256::MAX`.
pub fn decode_cap(encoded: U256) -> Result<U256, MathError> {
    if encoded.is_zero() {
        return Ok(U256::MAX);
    }

    let exponent = encoded.as_limbs()[0] & CAP_EXPONENT_MASK;
    let mantissa: U256 = encoded >> 6;

    // 10^63 < 2^256, so the power itself never overflows
    let scale = U256::from(10u8).pow(U256::from(exponent));
    let product: U512 = mantissa.widening_mul(scale);
    narrow(product / U512::from(100u8)).ok_or(MathError::Overflow)
}

/// Vault shares → underlying assets, rounding down.
///
/// `shares * (total_assets + V) / (total_supply + V)` with `V = 1e6`.
pub fn convert_to_assets(
    shares: U256,
    total_assets: U256,
    total_supply: U256,
) -> Result<U256, MathError> {
    let assets = total_assets
        .checked_add(VIRTUAL_DEPOSIT_AMOUNT)
        .ok_or(MathError::Overflow)?;
    let supply = total_supply
        .checked_add(VIRTUAL_DEPOSIT_AMOUNT)
        .ok_or(MathError::Overflow)?;
    mul_div_down(shares, assets, supply)
}

/// Decode one vault's raw fields.
///
/// Max-withdraw is taken from the borrow cap (caps index 1), which is
/// what the pool's swap limits are checked against.
pub fn decode_vault(raw: &RawVaultState) -> Result<VaultSnapshot, MathError> {
    Ok(VaultSnapshot {
        vault: raw.vault,
        cash: raw.cash,
        debt: raw.debt,
        max_deposit: raw.max_deposit,
        total_borrows: raw.total_borrows,
        max_withdraw: decode_cap(U256::from(raw.borrow_cap))?,
        account_assets: convert_to_assets(raw.account_balance, raw.total_assets, raw.total_supply)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(mantissa: u64, exponent: u64) -> U256 {
        U256::from((mantissa << 6) | exponent)
    }

    #[test]
    fn test_decode_cap_zero_is_unlimited() {
        assert_eq!(decode_cap(U256::ZERO).unwrap(), U256::MAX);
    }

    #[test]
    fn test_decode_cap_values() {
        // mantissa 100, exponent 2 → 100 * 100 / 100
        assert_eq!(decode_cap(cap(100, 2)).unwrap(), U256::from(100));
        // mantissa 1, exponent 0 → 1 / 100 floors to 0
        assert_eq!(decode_cap(cap(1, 0)).unwrap(), U256::ZERO);
        // mantissa 500, exponent 18 → 5e18
        assert_eq!(
            decode_cap(cap(500, 18)).unwrap(),
            U256::from(5_000_000_000_000_000_000u128)
        );
        // the 16-bit on-chain encoding: mantissa 1023, exponent 63 → 1023e61
        let expected = U256::from(1023u64) * U256::from(10u8).pow(U256::from(61u8));
        assert_eq!(decode_cap(U256::from(0xFFFFu16)).unwrap(), expected);
    }

    #[test]
    fn test_decode_cap_overflow() {
        // mantissa near 2^250 with exponent 63 cannot fit 256 bits
        let encoded = (U256::MAX >> 6 << 6) | U256::from(63u8);
        assert_eq!(decode_cap(encoded), Err(MathError::Overflow));
    }

    #[test]
    fn test_decode_cap_monotone_in_mantissa() {
        for exponent in [0u64, 1, 2, 6, 18, 40] {
            let mut previous = U256::ZERO;
            for mantissa in 1..200u64 {
                let value = decode_cap(cap(mantissa, exponent)).unwrap();
                assert!(value >= previous, "mantissa {} exponent {}", mantissa, exponent);
                previous = value;
            }
        }
    }

    #[test]
    fn test_convert_to_assets_zero_shares() {
        assert_eq!(
            convert_to_assets(U256::ZERO, U256::from(123), U256::from(456)).unwrap(),
            U256::ZERO
        );
        assert_eq!(convert_to_assets(U256::ZERO, U256::MAX - U256::from(1_000_000), U256::ZERO).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_convert_to_assets_virtual_deposit() {
        // empty vault: 1:1 through the virtual deposit
        assert_eq!(
            convert_to_assets(U256::from(500), U256::ZERO, U256::ZERO).unwrap(),
            U256::from(500)
        );
        // 1000 shares, 2e6 assets / 1e6 supply → 1000 * 3e6 / 2e6
        assert_eq!(
            convert_to_assets(U256::from(1000), U256::from(2_000_000), U256::from(1_000_000)).unwrap(),
            U256::from(1500)
        );
    }

    #[test]
    fn test_convert_to_assets_monotone_in_shares() {
        let total_assets = U256::from(16_002_487_184_920u64);
        let total_supply = U256::from(14_221_555_227_204u64);
        let mut previous = U256::ZERO;
        for shares in (0..10_000u64).step_by(37) {
            let value = convert_to_assets(U256::from(shares), total_assets, total_supply).unwrap();
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_convert_to_assets_overflow_is_distinct() {
        assert_eq!(
            convert_to_assets(U256::MAX, U256::MAX - VIRTUAL_DEPOSIT_AMOUNT, U256::ZERO),
            Err(MathError::MulDivOverflow)
        );
        assert_eq!(
            convert_to_assets(U256::from(1), U256::MAX, U256::ZERO),
            Err(MathError::Overflow)
        );
    }

    #[test]
    fn test_decode_vault_uses_borrow_cap() {
        let raw = RawVaultState {
            supply_cap: 0,
            borrow_cap: ((7u16) << 6) | 4,
            account_balance: U256::from(1000),
            total_assets: U256::from(2_000_000),
            total_supply: U256::from(1_000_000),
            ..Default::default()
        };
        let snapshot = decode_vault(&raw).unwrap();
        assert_eq!(snapshot.max_withdraw, U256::from(700));
        assert_eq!(snapshot.account_assets, U256::from(1500));
    }
}
