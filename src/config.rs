//! Configuration management
//!
//! Replica settings come from a TOML file. `.env` is loaded first and
//! `RPC_URL` / `STATE_FILE` from the environment override the file, so
//! secrets (RPC keys) can stay out of the TOML.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-15 (TOML replica config)

use crate::contracts::MULTICALL3_ADDRESS;
use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level replica configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// HTTP(S) or WS(S) endpoint
    #[serde(default)]
    pub rpc_url: String,
    pub chain_id: u64,
    /// EulerSwap factory to enumerate
    pub factory: Address,
    #[serde(default = "default_multicall")]
    pub multicall_address: Address,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Run a discovery pass every N fetch cycles
    #[serde(default = "default_discovery_every")]
    pub discovery_every_cycles: u64,
    #[serde(default = "default_page_size")]
    pub discovery_page_size: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
    /// Log collector stats every N cycles
    #[serde(default = "default_stats_every")]
    pub stats_every_cycles: u64,
}

fn default_multicall() -> Address { MULTICALL3_ADDRESS }
fn default_state_file() -> PathBuf { PathBuf::from("data/replica_state.json") }
fn default_poll_interval() -> u64 { 2000 }
fn default_discovery_every() -> u64 { 30 }
fn default_page_size() -> u64 { 20 }
fn default_fetch_timeout() -> u64 { 10_000 }
fn default_stats_every() -> u64 { 60 }

impl ReplicaConfig {
    /// Parse a TOML document; no environment overrides applied
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env`, the TOML file at `path`, then environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv::dotenv().ok();

        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: Self = toml::from_str(&content).context("Failed to parse TOML configuration")?;

        if let Ok(rpc_url) = std::env::var("RPC_URL") {
            config.rpc_url = rpc_url;
        }
        if let Ok(state_file) = std::env::var("STATE_FILE") {
            config.state_file = PathBuf::from(state_file);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.discovery_page_size == 0 {
            bail!("discovery_page_size must be non-zero");
        }
        if self.discovery_every_cycles == 0 {
            bail!("discovery_every_cycles must be non-zero");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be non-zero");
        }
        if self.fetch_timeout_ms == 0 {
            bail!("fetch_timeout_ms must be non-zero");
        }
        if self.stats_every_cycles == 0 {
            bail!("stats_every_cycles must be non-zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// WebSocket endpoints get a WS transport, everything else HTTP
    pub fn is_websocket(&self) -> bool {
        self.rpc_url.starts_with("ws://") || self.rpc_url.starts_with("wss://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        chain_id = 1
        factory = "0xb013be1d0d380c13b58e889f412895970a2cf228"
    "#;

    #[test]
    fn test_defaults() {
        let config = ReplicaConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.multicall_address, MULTICALL3_ADDRESS);
        assert_eq!(config.discovery_page_size, 20);
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.state_file, PathBuf::from("data/replica_state.json"));
        assert!(config.rpc_url.is_empty());
    }

    #[test]
    fn test_overrides_and_transport() {
        let config = ReplicaConfig::from_toml(
            r#"
            rpc_url = "wss://node.example/ws"
            chain_id = 8453
            factory = "0x0000000000000000000000000000000000000001"
            discovery_page_size = 5
            fetch_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert!(config.is_websocket());
        assert_eq!(config.discovery_page_size, 5);
        assert_eq!(config.fetch_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let toml = format!("{}\ndiscovery_page_size = 0\n", MINIMAL);
        assert!(ReplicaConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        for field in ["fetch_timeout_ms", "poll_interval_ms", "stats_every_cycles", "discovery_every_cycles"] {
            let toml = format!("{}\n{} = 0\n", MINIMAL, field);
            assert!(ReplicaConfig::from_toml(&toml).is_err(), "{} = 0 accepted", field);
        }
    }

    #[test]
    fn test_missing_factory_rejected() {
        assert!(ReplicaConfig::from_toml("chain_id = 1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("replica_config_{}.toml", std::process::id()));
        std::fs::write(&path, MINIMAL).unwrap();
        let config = ReplicaConfig::load(&path).unwrap();
        assert_eq!(config.chain_id, 1);
        std::fs::remove_file(&path).ok();

        assert!(ReplicaConfig::load("/nonexistent/replica.toml").is_err());
    }
}
