//! Pool Guard
//!
//! Promotes a raw batched read into a `PoolSnapshot`, degrading pools
//! that cannot trade to a uniform locked view with zero reserves.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use super::decoder::decode_vault;
use crate::error::MathError;
use crate::types::{PoolSnapshot, PoolStatus, RawPoolState};
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Why a pool was (or was not) degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Pass,
    /// The pool is no longer an authorized operator of its Euler account
    OperatorRevoked,
    /// The Euler account holds no shares in either vault
    EmptyAccount,
}

impl GuardVerdict {
    pub fn evaluate(raw: &RawPoolState) -> Self {
        if !raw.operator_authorized {
            return GuardVerdict::OperatorRevoked;
        }
        if raw.vaults.iter().all(|v| v.account_balance.is_zero()) {
            return GuardVerdict::EmptyAccount;
        }
        GuardVerdict::Pass
    }
}

/// Build the snapshot for `raw`.
///
/// Guard failures are not errors: they yield reserves `(0, 0)` and
/// status `Locked`. Decoding failures are errors.
pub fn promote(raw: &RawPoolState, captured_at: DateTime<Utc>) -> Result<PoolSnapshot, MathError> {
    let vaults = [decode_vault(&raw.vaults[0])?, decode_vault(&raw.vaults[1])?];

    let (reserve0, reserve1, status) = match GuardVerdict::evaluate(raw) {
        GuardVerdict::Pass => (raw.reserve0, raw.reserve1, PoolStatus::from_code(raw.status_code)),
        verdict => {
            debug!("Pool {:?} degraded to locked: {:?}", raw.pool, verdict);
            (U256::ZERO, U256::ZERO, PoolStatus::Locked)
        }
    };

    Ok(PoolSnapshot {
        pool: raw.pool,
        vaults,
        reserve0,
        reserve1,
        status,
        block_number: raw.block_number,
        captured_at,
        speculative: raw.speculative,
    })
}
