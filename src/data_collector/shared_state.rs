//! Replica State File
//!
//! JSON state shared between the replica and the processes that price
//! against it: the discovery cursor, every known pool's static descriptor,
//! its latest published snapshot and the sync statistics.
//!
//! Writes go to a temp file first and are renamed into place, so readers
//! never see a half-written file.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-15 (EulerSwap descriptors, snapshots and cursor)

use crate::types::{DiscoveredPool, DiscoveryCursor, PoolSnapshot, PoolStaticDescriptor};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// One known pool as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedPool {
    pub descriptor: PoolStaticDescriptor,
    pub discovered_at: DateTime<Utc>,
    /// Latest published snapshot; absent until the first fetch
    #[serde(default)]
    pub snapshot: Option<PoolSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    #[serde(default)]
    pub discovery_passes: u64,
    pub start_time: Option<DateTime<Utc>>,
}

/// State file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaStateFile {
    /// Last update timestamp
    pub last_updated: DateTime<Utc>,
    /// Highest block any published snapshot was read at
    pub block_number: u64,
    pub chain_id: u64,
    pub factory: Address,
    /// Discovery cursor, as its JSON blob
    #[serde(default)]
    pub cursor: String,
    /// Known pools, keyed by pool address
    pub pools: BTreeMap<Address, PersistedPool>,
    pub stats: SyncStats,
}

impl ReplicaStateFile {
    pub fn new(chain_id: u64, factory: Address) -> Self {
        Self {
            last_updated: Utc::now(),
            block_number: 0,
            chain_id,
            factory,
            cursor: String::new(),
            pools: BTreeMap::new(),
            stats: SyncStats {
                start_time: Some(Utc::now()),
                ..Default::default()
            },
        }
    }

    /// Resume from `path` if it holds state for the same chain and factory,
    /// otherwise start fresh.
    pub fn load_or_new<P: AsRef<Path>>(path: P, chain_id: u64, factory: Address) -> Self {
        if !path.as_ref().exists() {
            return Self::new(chain_id, factory);
        }
        match Self::read_from_file(path.as_ref()) {
            Ok(state) if state.chain_id == chain_id && state.factory == factory => state,
            Ok(state) => {
                warn!(
                    "State file {} is for chain {} / factory {:?}, starting fresh",
                    path.as_ref().display(),
                    state.chain_id,
                    state.factory
                );
                Self::new(chain_id, factory)
            }
            Err(e) => {
                warn!("Ignoring unreadable state file {}: {:#}", path.as_ref().display(), e);
                Self::new(chain_id, factory)
            }
        }
    }

    pub fn discovery_cursor(&self) -> DiscoveryCursor {
        DiscoveryCursor::from_blob(self.cursor.as_bytes())
    }

    pub fn set_discovery_cursor(&mut self, cursor: DiscoveryCursor) {
        self.cursor = String::from_utf8_lossy(&cursor.to_blob()).into_owned();
        self.last_updated = Utc::now();
    }

    /// Record a discovered pool. Returns false if it was already known.
    pub fn add_pool(&mut self, pool: DiscoveredPool) -> bool {
        let address = pool.descriptor.address;
        if self.pools.contains_key(&address) {
            return false;
        }
        self.pools.insert(
            address,
            PersistedPool {
                descriptor: pool.descriptor,
                discovered_at: pool.discovered_at,
                snapshot: None,
            },
        );
        self.last_updated = Utc::now();
        true
    }

    /// Store the latest published snapshot of a known pool
    pub fn update_snapshot(&mut self, snapshot: &PoolSnapshot) {
        if let Some(entry) = self.pools.get_mut(&snapshot.pool) {
            self.block_number = self.block_number.max(snapshot.block_number);
            entry.snapshot = Some(snapshot.clone());
            self.last_updated = Utc::now();
        }
    }

    pub fn descriptors(&self) -> Vec<PoolStaticDescriptor> {
        self.pools.values().map(|p| p.descriptor.clone()).collect()
    }

    /// Write to JSON file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize replica state")?;

        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
        }

        // Write to temp file first, then rename (atomic)
        let temp_path = path.as_ref().with_extension("tmp");
        std::fs::write(&temp_path, &json).context("Failed to write temp file")?;
        std::fs::rename(&temp_path, path.as_ref()).context("Failed to rename temp file")?;

        Ok(())
    }

    /// Read from JSON file
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).context("Failed to read replica state file")?;
        let state: Self = serde_json::from_str(&json).context("Failed to parse replica state JSON")?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::fetcher::tests::descriptor;
    use crate::pool::state::tests::snapshot;
    use alloy::primitives::U256;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}_{}.json", name, std::process::id()))
    }

    fn discovered() -> DiscoveredPool {
        DiscoveredPool {
            descriptor: descriptor(),
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_file_roundtrip() {
        let mut state = ReplicaStateFile::new(1, Address::repeat_byte(0xfa));
        assert!(state.add_pool(discovered()));
        assert!(!state.add_pool(discovered()));
        state.update_snapshot(&snapshot(descriptor().address, 12345, 900));
        state.set_discovery_cursor(DiscoveryCursor::new(7));
        state.stats.total_syncs = 3;

        let path = temp_path("replica_state_roundtrip");
        state.write_to_file(&path).unwrap();
        let restored = ReplicaStateFile::read_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.block_number, 12345);
        assert_eq!(restored.discovery_cursor(), DiscoveryCursor::new(7));
        assert_eq!(restored.stats, state.stats);
        let pool = &restored.pools[&descriptor().address];
        assert_eq!(pool.descriptor, descriptor());
        assert_eq!(pool.snapshot.as_ref().unwrap().reserve0, U256::from(900u64));
    }

    #[test]
    fn test_snapshot_for_unknown_pool_ignored() {
        let mut state = ReplicaStateFile::new(1, Address::ZERO);
        state.update_snapshot(&snapshot(Address::repeat_byte(0x99), 10, 1));
        assert!(state.pools.is_empty());
        assert_eq!(state.block_number, 0);
    }

    #[test]
    fn test_load_or_new() {
        let factory = Address::repeat_byte(0xfa);
        let path = temp_path("replica_state_load");
        std::fs::remove_file(&path).ok();

        // Missing file
        let fresh = ReplicaStateFile::load_or_new(&path, 1, factory);
        assert!(fresh.pools.is_empty());

        let mut state = ReplicaStateFile::new(1, factory);
        state.add_pool(discovered());
        state.write_to_file(&path).unwrap();

        assert_eq!(ReplicaStateFile::load_or_new(&path, 1, factory).pools.len(), 1);
        // Other chain: start over
        assert!(ReplicaStateFile::load_or_new(&path, 8453, factory).pools.is_empty());

        std::fs::write(&path, "not json").unwrap();
        assert!(ReplicaStateFile::load_or_new(&path, 1, factory).pools.is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_empty_cursor_starts_at_zero() {
        let state = ReplicaStateFile::new(1, Address::ZERO);
        assert_eq!(state.discovery_cursor(), DiscoveryCursor::default());
    }
}
