//! EulerSwap Replica Library
//!
//! Keeps a computation-ready replica of EulerSwap pool state: pages
//! through the factory's pool list, reads every pool atomically through
//! Multicall3, decodes vault quantities with EVM-exact arithmetic and
//! publishes immutable snapshots. Swap simulators quote against those
//! snapshots without touching the network.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-16 (EulerSwap replica + swap simulation)

pub mod config;
pub mod context;
pub mod contracts;
pub mod data_collector;
pub mod error;
pub mod math;
pub mod multicall;
pub mod pool;
pub mod simulator;
pub mod types;

// Re-export commonly used types
pub use config::ReplicaConfig;
pub use context::RequestContext;
pub use data_collector::{Replica, ReplicaStateFile};
pub use error::{DiscoveryError, MathError, ReplicaError};
pub use multicall::{BatchCaller, MulticallClient};
pub use pool::{PoolDiscoverer, SnapshotStore, StateFetcher};
pub use simulator::{EclpSimulator, SimulatorError, SwapQuote, SwapSimulator};
pub use types::{DiscoveryCursor, PoolSnapshot, PoolStaticDescriptor, PoolStatus};
