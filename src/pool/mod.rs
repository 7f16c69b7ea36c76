//! Pool replication module
//!
//! Handles pool discovery, atomic state fetch, snapshot decoding and
//! storage of the latest published snapshot per pool.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-02-14 (EulerSwap discovery, fetch and guard)

pub mod decoder;
pub mod discoverer;
pub mod fetcher;
pub mod guard;
pub mod state;

pub use decoder::{convert_to_assets, decode_cap, decode_vault};
pub use discoverer::PoolDiscoverer;
pub use fetcher::StateFetcher;
pub use guard::{promote, GuardVerdict};
pub use state::{PublishOutcome, SnapshotStore};
