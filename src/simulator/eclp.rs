//! E-CLP Vault Swap Simulator
//!
//! Quotes a swap the way the vault executes it:
//!
//!   exact-in:  wrap (buffer) → scale and apply rate → take fee →
//!              calcOutGivenIn → undo rate and scale → unwrap (buffer)
//!   exact-out: unwrap (buffer) → scale and apply rate → calcInGivenOut →
//!              add fee → undo rate and scale → wrap (buffer)
//!
//! Each step rounds in the pool's favour. Tokens can be addressed by their
//! underlying asset (routed through the ERC-4626 buffer) or by the pool
//! token itself (no buffer leg).
//!
//! Author: AI-Generated
//! Created: 2026-02-16

use super::eclp_math::{
    calc_in_given_out, calc_out_given_in, calculate_invariant_with_error, invariant_vector, EclpDerivedParams,
    EclpParams,
};
use super::fixed_point::{complement, div_down, div_up, mul_down, mul_up, rate_round_up, to_signed, to_unsigned};
use super::{SimulatorError, SwapQuote, SwapSimulator};
use crate::error::MathError;
use crate::math::{mul_div_down, mul_div_up};
use alloy::primitives::{Address, U256};

/// Smallest scaled18 amount the vault accepts on either side of a swap
pub const MINIMUM_TRADE_AMOUNT: u64 = 1_000_000;

/// Smallest raw amount a buffer wraps or unwraps
pub const MINIMUM_WRAP_AMOUNT: u64 = 10_000;

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// ERC-4626 wrapper state used to convert between assets and shares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc4626Buffer {
    pub underlying: Address,
    pub total_assets: U256,
    pub total_supply: U256,
}

impl Erc4626Buffer {
    fn to_shares(&self, assets: U256) -> Result<U256, MathError> {
        mul_div_down(assets, self.total_supply, self.total_assets)
    }

    fn to_assets(&self, shares: U256, round_up: bool) -> Result<U256, MathError> {
        if round_up {
            mul_div_up(shares, self.total_assets, self.total_supply)
        } else {
            mul_div_down(shares, self.total_assets, self.total_supply)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EclpToken {
    /// Pool token address
    pub token: Address,
    /// Present when the pool token wraps the token users trade
    pub buffer: Option<Erc4626Buffer>,
    /// 10^(18 - decimals)
    pub scaling_factor: U256,
    /// Token rate, 18 decimals (1e18 for tokens without a rate provider)
    pub rate: U256,
}

impl EclpToken {
    fn scale_factor_with_rate(&self, rate: U256) -> Result<U256, MathError> {
        self.scaling_factor.checked_mul(rate).ok_or(MathError::Overflow)
    }
}

/// Immutable state of one E-CLP pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EclpPoolSnapshot {
    pub pool: Address,
    pub tokens: [EclpToken; 2],
    /// Balances with scaling and rate applied
    pub balances_live_scaled18: [U256; 2],
    pub swap_fee_percentage: U256,
    pub params: EclpParams,
    pub derived: EclpDerivedParams,
    pub block_number: u64,
}

/// Which side of the pool a token address refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Leg {
    index: usize,
    through_buffer: bool,
}

impl EclpPoolSnapshot {
    fn resolve(&self, token: Address) -> Option<Leg> {
        self.tokens.iter().enumerate().find_map(|(index, t)| {
            if t.buffer.as_ref().is_some_and(|b| b.underlying == token) {
                Some(Leg {
                    index,
                    through_buffer: true,
                })
            } else if t.token == token {
                Some(Leg {
                    index,
                    through_buffer: false,
                })
            } else {
                None
            }
        })
    }

    fn legs(&self, token_in: Address, token_out: Address) -> Result<(Leg, Leg), SimulatorError> {
        let leg_in = self.resolve(token_in).ok_or(SimulatorError::InvalidToken)?;
        let leg_out = self.resolve(token_out).ok_or(SimulatorError::InvalidToken)?;
        if leg_in.index == leg_out.index {
            return Err(SimulatorError::InvalidToken);
        }
        Ok((leg_in, leg_out))
    }

    fn signed_balances(&self) -> Result<[alloy::primitives::I256; 2], MathError> {
        Ok([
            to_signed(self.balances_live_scaled18[0])?,
            to_signed(self.balances_live_scaled18[1])?,
        ])
    }

    fn on_swap(&self, exact_in: bool, token_in_is_0: bool, amount_scaled18: U256) -> Result<U256, SimulatorError> {
        let balances = self.signed_balances()?;
        let (invariant, err) = calculate_invariant_with_error(balances, &self.params, &self.derived)?;
        let r = invariant_vector(invariant, err)?;
        let amount = to_signed(amount_scaled18)?;

        let result = if exact_in {
            calc_out_given_in(balances, amount, token_in_is_0, &self.params, &self.derived, &r)?
        } else {
            calc_in_given_out(balances, amount, token_in_is_0, &self.params, &self.derived, &r)?
        };
        Ok(to_unsigned(result)?)
    }
}

fn ensure_trade_amount(amount: U256, error: SimulatorError) -> Result<(), SimulatorError> {
    if amount < U256::from(MINIMUM_TRADE_AMOUNT) {
        return Err(error);
    }
    Ok(())
}

fn ensure_wrap_amount(amount: U256, error: SimulatorError) -> Result<(), SimulatorError> {
    if amount < U256::from(MINIMUM_WRAP_AMOUNT) {
        return Err(error);
    }
    Ok(())
}

// ── Simulator ────────────────────────────────────────────────────────────────

/// Stateless E-CLP quoter
#[derive(Debug, Clone, Copy, Default)]
pub struct EclpSimulator;

impl EclpSimulator {
    pub fn new() -> Self {
        Self
    }
}

impl SwapSimulator for EclpSimulator {
    type Snapshot = EclpPoolSnapshot;

    fn calc_amount_out(
        &self,
        snapshot: &EclpPoolSnapshot,
        token_in: Address,
        amount_in: U256,
        token_out: Address,
    ) -> Result<SwapQuote, SimulatorError> {
        let (leg_in, leg_out) = snapshot.legs(token_in, token_out)?;
        let t_in = &snapshot.tokens[leg_in.index];
        let t_out = &snapshot.tokens[leg_out.index];

        let mut amount = amount_in;
        if let Some(buffer) = t_in.buffer.as_ref().filter(|_| leg_in.through_buffer) {
            ensure_wrap_amount(amount, SimulatorError::AmountInTooSmall)?;
            amount = buffer.to_shares(amount)?;
        }

        let scaled = amount.checked_mul(t_in.scaling_factor).ok_or(MathError::Overflow)?;
        let scaled = mul_down(scaled, t_in.rate)?;
        let fee = mul_up(scaled, snapshot.swap_fee_percentage)?;
        let scaled = scaled.checked_sub(fee).ok_or(MathError::Underflow)?;
        ensure_trade_amount(scaled, SimulatorError::AmountInTooSmall)?;

        let out_scaled = snapshot.on_swap(true, leg_in.index == 0, scaled)?;
        ensure_trade_amount(out_scaled, SimulatorError::AmountOutTooSmall)?;

        let mut amount_out = div_down(out_scaled, t_out.scale_factor_with_rate(rate_round_up(t_out.rate)?)?)?;
        if let Some(buffer) = t_out.buffer.as_ref().filter(|_| leg_out.through_buffer) {
            ensure_wrap_amount(amount_out, SimulatorError::AmountOutTooSmall)?;
            amount_out = buffer.to_assets(amount_out, false)?;
        }

        Ok(SwapQuote {
            amount: amount_out,
            fee,
        })
    }

    fn calc_amount_in(
        &self,
        snapshot: &EclpPoolSnapshot,
        token_out: Address,
        amount_out: U256,
        token_in: Address,
    ) -> Result<SwapQuote, SimulatorError> {
        let (leg_in, leg_out) = snapshot.legs(token_in, token_out)?;
        let t_in = &snapshot.tokens[leg_in.index];
        let t_out = &snapshot.tokens[leg_out.index];

        let mut amount = amount_out;
        if let Some(buffer) = t_out.buffer.as_ref().filter(|_| leg_out.through_buffer) {
            ensure_wrap_amount(amount, SimulatorError::AmountOutTooSmall)?;
            amount = buffer.to_shares(amount)?;
        }

        let scaled = amount.checked_mul(t_out.scaling_factor).ok_or(MathError::Overflow)?;
        let scaled = mul_up(scaled, rate_round_up(t_out.rate)?)?;
        ensure_trade_amount(scaled, SimulatorError::AmountOutTooSmall)?;

        let in_scaled = snapshot.on_swap(false, leg_in.index == 0, scaled)?;
        ensure_trade_amount(in_scaled, SimulatorError::AmountInTooSmall)?;

        let fee = mul_div_up(
            in_scaled,
            snapshot.swap_fee_percentage,
            complement(snapshot.swap_fee_percentage),
        )?;
        let in_scaled = in_scaled.checked_add(fee).ok_or(MathError::Overflow)?;

        let mut amount_in = div_up(in_scaled, t_in.scale_factor_with_rate(t_in.rate)?)?;
        if let Some(buffer) = t_in.buffer.as_ref().filter(|_| leg_in.through_buffer) {
            ensure_wrap_amount(amount_in, SimulatorError::AmountInTooSmall)?;
            amount_in = buffer.to_assets(amount_in, true)?;
        }

        Ok(SwapQuote { amount: amount_in, fee })
    }
}
