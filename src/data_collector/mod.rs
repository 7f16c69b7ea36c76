//! Data Collector Module
//!
//! Keeps the replica in sync: every poll tick fetches all known pools
//! concurrently and publishes their snapshots; every N ticks (or on
//! SIGHUP) one discovery page grows the known pool set. State is written
//! to a shared JSON file after each cycle for other processes to consume.
//!
//! Sync Strategy:
//! - discovery reads at most one page per pass, so a large factory is
//!   picked up gradually instead of in one burst
//! - each pool fetch is a single Multicall3 batch with its own deadline
//! - a failed pool fetch is logged and retried on the next tick
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-15 (EulerSwap discovery + fetch cycles, cancellation)

pub mod shared_state;

pub use shared_state::{PersistedPool, ReplicaStateFile, SyncStats};

use crate::config::ReplicaConfig;
use crate::context::RequestContext;
use crate::error::{DiscoveryError, ReplicaError};
use crate::multicall::BatchCaller;
use crate::pool::{PoolDiscoverer, PublishOutcome, SnapshotStore, StateFetcher};
use anyhow::Result;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Outcome counts of one fetch cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub published: usize,
    pub stale: usize,
    pub failed: usize,
}

/// Discovery, fetch and persistence for one factory
pub struct Replica {
    discoverer: PoolDiscoverer,
    fetcher: StateFetcher,
    store: SnapshotStore,
    state: ReplicaStateFile,
    config: ReplicaConfig,
    force_discovery: Arc<AtomicBool>,
}

impl Replica {
    /// Build a replica over `caller`, resuming from `state`.
    /// Snapshots in `state` are published to the store right away.
    pub fn new(caller: Arc<dyn BatchCaller>, config: ReplicaConfig, state: ReplicaStateFile) -> Self {
        let store = SnapshotStore::new();
        for pool in state.pools.values() {
            if let Some(snapshot) = &pool.snapshot {
                store.publish(snapshot.clone());
            }
        }

        Self {
            discoverer: PoolDiscoverer::new(Arc::clone(&caller), config.factory),
            fetcher: StateFetcher::new(caller),
            store,
            state,
            config,
            force_discovery: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle to the published snapshots
    pub fn store(&self) -> SnapshotStore {
        self.store.clone()
    }

    pub fn state(&self) -> &ReplicaStateFile {
        &self.state
    }

    /// Setting this flag makes the next cycle run discovery
    pub fn force_discovery_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.force_discovery)
    }

    /// Read one discovery page and record the new pools.
    /// On failure the persisted cursor is left where it was.
    pub async fn discover_once(&mut self, ctx: &RequestContext) -> Result<usize, DiscoveryError> {
        let cursor = self.state.discovery_cursor();
        let page = self
            .discoverer
            .discover(cursor, self.config.discovery_page_size, ctx)
            .await?;

        let mut added = 0;
        for pool in page.pools {
            if self.state.add_pool(pool) {
                added += 1;
            }
        }
        self.state.set_discovery_cursor(page.cursor);
        self.state.stats.discovery_passes += 1;

        if added > 0 {
            info!("Discovery: {} new pools ({} known)", added, self.state.pools.len());
        }
        Ok(added)
    }

    /// Fetch every known pool concurrently and publish the results
    pub async fn fetch_once(&mut self, ctx: &RequestContext) -> FetchSummary {
        let descriptors = self.state.descriptors();
        let started = Instant::now();

        let fetches = descriptors.iter().map(|descriptor| {
            let pool_ctx = ctx.with_timeout(self.config.fetch_timeout());
            let fetcher = &self.fetcher;
            async move { (descriptor.address, fetcher.snapshot(descriptor, None, &pool_ctx).await) }
        });
        let results = join_all(fetches).await;

        let mut summary = FetchSummary::default();
        for (pool, result) in results {
            match result {
                Ok(snapshot) => match self.store.publish(snapshot.clone()) {
                    PublishOutcome::Inserted | PublishOutcome::Replaced => {
                        self.state.update_snapshot(&snapshot);
                        summary.published += 1;
                    }
                    PublishOutcome::Stale | PublishOutcome::Speculative => summary.stale += 1,
                },
                Err(ReplicaError::Cancelled) => {
                    debug!("Fetch for {:?} cancelled", pool);
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!("Fetch failed for pool {:?}: {}", pool, e);
                    summary.failed += 1;
                }
            }
        }

        self.state.stats.total_syncs += 1;
        if summary.failed == 0 {
            self.state.stats.successful_syncs += 1;
        } else {
            self.state.stats.failed_syncs += 1;
        }

        debug!(
            "Fetch cycle: {} published, {} stale, {} failed in {}ms",
            summary.published,
            summary.stale,
            summary.failed,
            started.elapsed().as_millis()
        );
        summary
    }

    /// Write the state file
    pub fn persist(&self) -> Result<()> {
        self.state.write_to_file(&self.config.state_file)
    }

    fn discovery_due(&self, cycle: u64) -> bool {
        let forced = self.force_discovery.swap(false, Ordering::SeqCst);
        if forced {
            info!("Discovery forced");
        }
        forced || cycle == 1 || cycle % self.config.discovery_every_cycles == 0
    }

    /// Run one full cycle: discovery if due, fetch, persist.
    /// Returns false once `ctx` is cancelled.
    pub async fn cycle(&mut self, cycle: u64, ctx: &RequestContext) -> bool {
        if self.discovery_due(cycle) {
            match self.discover_once(ctx).await {
                Ok(_) => {}
                Err(e) if matches!(e.source, ReplicaError::Cancelled) => return false,
                Err(e) => error!("{}", e),
            }
        }

        self.fetch_once(ctx).await;
        if ctx.is_cancelled() {
            return false;
        }

        if let Err(e) = self.persist() {
            error!("Failed to write state file: {:#}", e);
        }

        if cycle % self.config.stats_every_cycles == 0 {
            let (count, oldest, newest) = self.store.stats();
            info!(
                "Replica stats: {} cycles, {} pools known, {} published, blocks {}..{}",
                self.state.stats.total_syncs,
                self.state.pools.len(),
                count,
                oldest,
                newest
            );
        }
        true
    }

    /// Run until `ctx` is cancelled, or for a single cycle if `once`
    pub async fn run(mut self, ctx: RequestContext, once: bool) -> Result<()> {
        info!("Starting EulerSwap replica");
        info!("  Chain ID: {}", self.config.chain_id);
        info!("  Factory: {:?}", self.config.factory);
        info!("  Poll interval: {}ms", self.config.poll_interval_ms);
        info!("  State file: {}", self.config.state_file.display());
        info!("  Known pools: {}", self.state.pools.len());

        let mut ticks = IntervalStream::new(tokio::time::interval(self.config.poll_interval()));
        let mut cycle = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = ctx.token().cancelled() => break,
                tick = ticks.next() => {
                    if tick.is_none() {
                        break;
                    }
                }
            }

            cycle += 1;
            if !self.cycle(cycle, &ctx).await || once {
                break;
            }
        }

        info!("Replica stopping after {} cycles", cycle);
        self.persist()
    }
}
