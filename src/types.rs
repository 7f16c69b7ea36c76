//! Core types for the EulerSwap replica

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Position in the factory's pool list. Opaque to callers; persisted as
/// a small JSON blob between discovery passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryCursor {
    pub offset: u64,
}

impl DiscoveryCursor {
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Decode a persisted cursor blob.
    ///
    /// An empty blob is a fresh start (offset 0). A blob that does not
    /// parse is logged and also treated as offset 0.
    pub fn from_blob(blob: &[u8]) -> Self {
        if blob.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice::<Self>(blob) {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!("Malformed discovery cursor, restarting from 0: {}", e);
                Self::default()
            }
        }
    }

    /// Encode as `{"offset":N}`
    pub fn to_blob(&self) -> Vec<u8> {
        serde_json::json!({ "offset": self.offset })
            .to_string()
            .into_bytes()
    }
}

/// Immutable per-pool configuration read once at discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStaticDescriptor {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub vault0: Address,
    pub vault1: Address,
    /// Account whose collateral and debt back the pool
    pub euler_account: Address,
    pub equilibrium_reserve0: U256,
    pub equilibrium_reserve1: U256,
    pub price_x: U256,
    pub price_y: U256,
    pub concentration_x: U256,
    pub concentration_y: U256,
    pub fee: U256,
    pub protocol_fee: U256,
    pub protocol_fee_recipient: Address,
    /// Ethereum Vault Connector that arbitrates operator authorization
    pub evc: Address,
}

impl PoolStaticDescriptor {
    pub fn vaults(&self) -> [Address; 2] {
        [self.vault0, self.vault1]
    }
}

/// A pool returned by a discovery pass. Reserves are always zero until
/// the first state fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredPool {
    pub descriptor: PoolStaticDescriptor,
    pub reserve0: U256,
    pub reserve1: U256,
    pub discovered_at: DateTime<Utc>,
}

/// Result of one discovery pass
#[derive(Debug, Clone)]
pub struct DiscoveryPage {
    pub pools: Vec<DiscoveredPool>,
    pub cursor: DiscoveryCursor,
}

/// Pool lifecycle status as reported by `getReserves()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolStatus {
    Unactivated,
    Unlocked,
    Locked,
}

impl PoolStatus {
    /// Map the on-chain status code. Codes this build does not know are
    /// treated as `Locked` so the pool is never quoted on guesswork.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => PoolStatus::Unactivated,
            1 => PoolStatus::Unlocked,
            2 => PoolStatus::Locked,
            other => {
                warn!("Unknown pool status code {}, treating as locked", other);
                PoolStatus::Locked
            }
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolStatus::Unactivated => write!(f, "unactivated"),
            PoolStatus::Unlocked => write!(f, "unlocked"),
            PoolStatus::Locked => write!(f, "locked"),
        }
    }
}

/// Undecoded per-vault fields exactly as returned by the batched read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVaultState {
    pub vault: Address,
    pub cash: U256,
    pub debt: U256,
    pub max_deposit: U256,
    pub supply_cap: u16,
    pub borrow_cap: u16,
    pub total_borrows: U256,
    pub total_assets: U256,
    pub total_supply: U256,
    /// Vault share balance of the pool's Euler account
    pub account_balance: U256,
}

/// Everything one atomic batched read returns for a pool.
/// All fields were observed at `block_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPoolState {
    pub pool: Address,
    pub vaults: [RawVaultState; 2],
    pub reserve0: U256,
    pub reserve1: U256,
    pub status_code: u32,
    pub operator_authorized: bool,
    pub block_number: u64,
    /// Read with caller-supplied state overrides; never published
    pub speculative: bool,
}

/// Decoded per-vault quantities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub vault: Address,
    pub cash: U256,
    pub debt: U256,
    pub max_deposit: U256,
    pub total_borrows: U256,
    pub max_withdraw: U256,
    pub account_assets: U256,
}

/// Computation-ready view of one pool at one block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub pool: Address,
    pub vaults: [VaultSnapshot; 2],
    pub reserve0: U256,
    pub reserve1: U256,
    pub status: PoolStatus,
    pub block_number: u64,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub speculative: bool,
}

impl PoolSnapshot {
    /// Whether a pricing engine may quote against this snapshot
    pub fn is_swappable(&self) -> bool {
        self.status == PoolStatus::Unlocked
    }
}
