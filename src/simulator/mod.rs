//! Swap Simulation
//!
//! `SwapSimulator` is the boundary between the replica and pricing code:
//! a pure function of an immutable snapshot. Implementations hold no
//! interior mutability, so one snapshot can be quoted from any number of
//! threads at once.
//!
//! `EclpSimulator` is the bundled implementation: a vault swap over an
//! elliptic concentrated liquidity pool whose pool tokens are ERC-4626
//! wrappers of the tokens users trade.
//!
//! Author: AI-Generated
//! Created: 2026-02-16

pub mod eclp;
pub mod eclp_math;
pub mod fixed_point;

pub use eclp::{EclpPoolSnapshot, EclpSimulator, EclpToken, Erc4626Buffer};
pub use eclp_math::{EclpDerivedParams, EclpParams, Vector2};

use crate::error::MathError;
use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Result of a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    /// Amount out (exact-in) or amount in (exact-out), in raw token units
    pub amount: U256,
    /// Swap fee charged, 18-decimal scaled, in units of the input pool token
    pub fee: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimulatorError {
    #[error("amount in too small")]
    AmountInTooSmall,
    #[error("amount out too small")]
    AmountOutTooSmall,
    #[error("swap would exceed the pool's asset bounds")]
    AssetBoundsExceeded,
    #[error("token is not part of this pool")]
    InvalidToken,
    #[error("pool balances exceed the maximum")]
    MaxBalancesExceeded,
    #[error("pool invariant exceeds the maximum")]
    MaxInvariantExceeded,
    #[error("math error: {0}")]
    Math(#[from] MathError),
}

/// Quotes swaps against a snapshot of pool state.
pub trait SwapSimulator: Send + Sync {
    type Snapshot;

    /// Exact-in: how much `token_out` does `amount_in` of `token_in` buy
    fn calc_amount_out(
        &self,
        snapshot: &Self::Snapshot,
        token_in: Address,
        amount_in: U256,
        token_out: Address,
    ) -> Result<SwapQuote, SimulatorError>;

    /// Exact-out: how much `token_in` is needed to receive `amount_out` of `token_out`
    fn calc_amount_in(
        &self,
        snapshot: &Self::Snapshot,
        token_out: Address,
        amount_out: U256,
        token_in: Address,
    ) -> Result<SwapQuote, SimulatorError>;
}
