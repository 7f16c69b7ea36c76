//! EulerSwap Replica Binary
//!
//! Keeps a local replica of every pool a factory has deployed and writes
//! it to a shared JSON state file for pricing processes to consume.
//!
//! Usage:
//!   eulerswap-replica --config config/replica.toml
//!   eulerswap-replica --config config/replica.toml --once
//!
//! Signals:
//! - SIGINT / SIGTERM: abort in-flight reads, write state, exit
//! - SIGHUP: run a discovery pass on the next cycle
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-15 (replica composition root, signal handling)

use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::transports::http::reqwest::Url;
use anyhow::{bail, Context, Result};
use clap::Parser;
use eulerswap_replica::config::ReplicaConfig;
use eulerswap_replica::context::RequestContext;
use eulerswap_replica::data_collector::{Replica, ReplicaStateFile};
use eulerswap_replica::multicall::MulticallClient;
use futures::StreamExt;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// EulerSwap pool replica
#[derive(Parser)]
#[command(name = "eulerswap-replica")]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, env = "REPLICA_CONFIG", default_value = "config/replica.toml")]
    config: PathBuf,

    /// Run a single discovery + fetch cycle and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

async fn connect(config: &ReplicaConfig) -> Result<DynProvider> {
    if config.rpc_url.is_empty() {
        bail!("No RPC endpoint: set rpc_url in the config or RPC_URL in the environment");
    }

    let provider = if config.is_websocket() {
        ProviderBuilder::new()
            .connect_ws(WsConnect::new(config.rpc_url.clone()))
            .await
            .context("Failed to connect WebSocket provider")?
            .erased()
    } else {
        let url: Url = config.rpc_url.parse().context("Invalid RPC URL")?;
        ProviderBuilder::new().connect_http(url).erased()
    };

    let chain_id = provider.get_chain_id().await.context("Failed to query chain id")?;
    if chain_id != config.chain_id {
        bail!("RPC endpoint is on chain {}, config expects {}", chain_id, config.chain_id);
    }
    Ok(provider)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!("===========================================");
    info!("   EulerSwap Replica");
    info!("===========================================");

    let config = ReplicaConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    info!("Config file: {}", args.config.display());

    let provider = Arc::new(connect(&config).await?);
    let endpoint: String = config.rpc_url.chars().take(50).collect();
    info!("Connected to RPC: {}", endpoint);

    let caller = Arc::new(MulticallClient::new(provider, config.multicall_address));
    let state = ReplicaStateFile::load_or_new(&config.state_file, config.chain_id, config.factory);
    let replica = Replica::new(caller, config, state);

    // SIGINT/SIGTERM cancel the root token, SIGHUP forces discovery
    let root = CancellationToken::new();
    let force_discovery = replica.force_discovery_flag();
    let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM])?;
    let handle = signals.handle();
    let shutdown = root.clone();
    tokio::spawn(async move {
        while let Some(sig) = signals.next().await {
            if sig == SIGHUP {
                info!("Received SIGHUP - forcing discovery");
                force_discovery.store(true, Ordering::SeqCst);
            } else {
                info!("Received signal {} - shutting down", sig);
                shutdown.cancel();
                break;
            }
        }
    });

    let result = replica.run(RequestContext::new(root), args.once).await;
    handle.close();
    result
}
