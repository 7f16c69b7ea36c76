//! Replica Error Types
//!
//! Library-level errors. Remote-read failures, decode failures and
//! arithmetic failures are kept distinct so callers can tell a flaky
//! node apart from a pool whose on-chain numbers cannot be represented.
//!
//! Guard outcomes (revoked operator, empty account) are NOT errors: they
//! produce a normal snapshot with status `Locked`.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use crate::types::DiscoveryCursor;
use alloy::primitives::Address;
use thiserror::Error;

/// Checked-arithmetic failures. Never clamped, never wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("mul-div result does not fit in 256 bits")]
    MulDivOverflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("division by zero")]
    ZeroDivision,
    #[error("square root did not converge within tolerance")]
    SqrtFailed,
}

/// Errors from discovery, fetch and decode.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// RPC failure of the aggregate `eth_call`, including a reverted call
    #[error("transport error: {0}")]
    Transport(#[from] alloy::contract::Error),

    #[error("sub-call {index} to {target} failed")]
    CallFailed { index: usize, target: Address },

    #[error("abi decode error: {0}")]
    Abi(#[from] alloy::sol_types::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("math error: {0}")]
    Math(#[from] MathError),

    #[error("discovery page size must be non-zero")]
    InvalidPageSize,

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// A failed discovery pass. Carries the cursor the caller started with,
/// so a retry resumes from the same place.
#[derive(Debug, Error)]
#[error("discovery failed at offset {}: {source}", .cursor.offset)]
pub struct DiscoveryError {
    pub cursor: DiscoveryCursor,
    #[source]
    pub source: ReplicaError,
}

impl DiscoveryError {
    pub fn new(cursor: DiscoveryCursor, source: ReplicaError) -> Self {
        Self { cursor, source }
    }
}
