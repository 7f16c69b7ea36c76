//! Snapshot Store
//!
//! Thread-safe storage for published pool snapshots using DashMap.
//! Readers get an `Arc<PoolSnapshot>` and keep it as long as they like;
//! publishing swaps the Arc, it never mutates a snapshot in place.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-02-14 (block-height versioning, speculative snapshots rejected)

use crate::types::PoolSnapshot;
use alloy::primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// First snapshot for this pool
    Inserted,
    /// Replaced a snapshot at an equal or lower block
    Replaced,
    /// Published snapshot is newer; nothing changed
    Stale,
    /// Snapshot was read with state overrides and is never published
    Speculative,
}

/// Latest snapshot per pool, keyed by pool address
#[derive(Debug)]
pub struct SnapshotStore {
    snapshots: Arc<DashMap<Address, Arc<PoolSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(DashMap::new()),
        }
    }

    /// Publish `snapshot` unless it is speculative or older than what is
    /// already published for the pool.
    pub fn publish(&self, snapshot: PoolSnapshot) -> PublishOutcome {
        if snapshot.speculative {
            debug!("Refusing to publish speculative snapshot for {:?}", snapshot.pool);
            return PublishOutcome::Speculative;
        }

        match self.snapshots.entry(snapshot.pool) {
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(snapshot));
                PublishOutcome::Inserted
            }
            Entry::Occupied(mut entry) => {
                if entry.get().block_number > snapshot.block_number {
                    debug!(
                        "Ignoring stale snapshot for {:?}: block {} < published {}",
                        snapshot.pool,
                        snapshot.block_number,
                        entry.get().block_number
                    );
                    return PublishOutcome::Stale;
                }
                debug!(
                    "Publishing {:?} @ block {} - reserves: ({}, {}) {}",
                    snapshot.pool, snapshot.block_number, snapshot.reserve0, snapshot.reserve1, snapshot.status
                );
                entry.insert(Arc::new(snapshot));
                PublishOutcome::Replaced
            }
        }
    }

    /// Latest published snapshot for `pool`
    pub fn get(&self, pool: &Address) -> Option<Arc<PoolSnapshot>> {
        self.snapshots.get(pool).map(|entry| Arc::clone(entry.value()))
    }

    /// Get statistics: (pool_count, oldest_block, newest_block)
    pub fn stats(&self) -> (usize, u64, u64) {
        let count = self.snapshots.len();
        let min_block = self
            .snapshots
            .iter()
            .map(|entry| entry.value().block_number)
            .min()
            .unwrap_or(0);
        let max_block = self
            .snapshots
            .iter()
            .map(|entry| entry.value().block_number)
            .max()
            .unwrap_or(0);

        (count, min_block, max_block)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SnapshotStore {
    fn clone(&self) -> Self {
        Self {
            snapshots: Arc::clone(&self.snapshots),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{PoolStatus, VaultSnapshot};
    use alloy::primitives::U256;
    use chrono::Utc;

    pub(crate) fn snapshot(pool: Address, block: u64, reserve0: u64) -> PoolSnapshot {
        let vault = VaultSnapshot {
            vault: Address::ZERO,
            cash: U256::ZERO,
            debt: U256::ZERO,
            max_deposit: U256::ZERO,
            total_borrows: U256::ZERO,
            max_withdraw: U256::MAX,
            account_assets: U256::ZERO,
        };
        PoolSnapshot {
            pool,
            vaults: [vault.clone(), vault],
            reserve0: U256::from(reserve0),
            reserve1: U256::from(1u64),
            status: PoolStatus::Unlocked,
            block_number: block,
            captured_at: Utc::now(),
            speculative: false,
        }
    }

    #[test]
    fn test_publish_and_get() {
        let store = SnapshotStore::new();
        let pool = Address::repeat_byte(1);

        assert_eq!(store.publish(snapshot(pool, 100, 5)), PublishOutcome::Inserted);
        let current = store.get(&pool).unwrap();
        assert_eq!(current.reserve0, U256::from(5u64));
        assert_eq!(current.block_number, 100);
    }

    #[test]
    fn test_newer_block_replaces() {
        let store = SnapshotStore::new();
        let pool = Address::repeat_byte(1);
        store.publish(snapshot(pool, 100, 5));

        assert_eq!(store.publish(snapshot(pool, 101, 6)), PublishOutcome::Replaced);
        assert_eq!(store.get(&pool).unwrap().reserve0, U256::from(6u64));
    }

    #[test]
    fn test_older_block_is_rejected() {
        let store = SnapshotStore::new();
        let pool = Address::repeat_byte(1);
        store.publish(snapshot(pool, 100, 5));

        assert_eq!(store.publish(snapshot(pool, 99, 7)), PublishOutcome::Stale);
        assert_eq!(store.get(&pool).unwrap().reserve0, U256::from(5u64));
    }

    #[test]
    fn test_speculative_never_published() {
        let store = SnapshotStore::new();
        let pool = Address::repeat_byte(1);
        let mut speculative = snapshot(pool, 200, 9);
        speculative.speculative = true;

        assert_eq!(store.publish(speculative), PublishOutcome::Speculative);
        assert!(store.get(&pool).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let store = SnapshotStore::new();
        let pool = Address::repeat_byte(1);
        store.publish(snapshot(pool, 100, 5));

        let held = store.get(&pool).unwrap();
        store.publish(snapshot(pool, 101, 6));
        assert_eq!(held.reserve0, U256::from(5u64));
        assert_eq!(store.get(&pool).unwrap().reserve0, U256::from(6u64));
    }

    #[test]
    fn test_stats_and_shared_handle() {
        let store = SnapshotStore::new();
        assert_eq!(store.stats(), (0, 0, 0));
        store.publish(snapshot(Address::repeat_byte(1), 100, 1));

        // clones share one map
        let shared = store.clone();
        shared.publish(snapshot(Address::repeat_byte(2), 150, 1));
        assert_eq!(store.stats(), (2, 100, 150));
        assert_eq!(store.len(), 2);
    }
}
