//! Pool Discovery
//!
//! Pages through the EulerSwap factory's pool list. Each pass reads at
//! most one page and returns the pools found plus the advanced cursor.
//!
//! Discovery Strategy:
//! - `poolsLength()` first; nothing to do when the cursor is at the end
//! - a cursor past the end means the factory dropped pools: restart from 0
//! - `poolsSlice(offset, offset + batch)` for the page's addresses
//! - ONE batch of `getAssets` + `getParams` + `EVC` over every new pool
//!
//! Any failure returns the caller's original cursor, so no progress is
//! ever recorded for a page that was not fully read.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use crate::context::RequestContext;
use crate::contracts::{IEulerSwap, IEulerSwapFactory};
use crate::error::{DiscoveryError, ReplicaError};
use crate::multicall::{sub_call, BatchCaller};
use crate::types::{DiscoveredPool, DiscoveryCursor, DiscoveryPage, PoolStaticDescriptor};
use alloy::primitives::{Address, U256};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Sub-calls issued per pool when reading static data
const CALLS_PER_POOL: usize = 3;

pub struct PoolDiscoverer {
    caller: Arc<dyn BatchCaller>,
    factory: Address,
}

impl PoolDiscoverer {
    pub fn new(caller: Arc<dyn BatchCaller>, factory: Address) -> Self {
        Self { caller, factory }
    }

    /// Read the next page of pools after `cursor`
    pub async fn discover(
        &self,
        cursor: DiscoveryCursor,
        page_size: u64,
        ctx: &RequestContext,
    ) -> Result<DiscoveryPage, DiscoveryError> {
        let started = Instant::now();
        match self.next_page(cursor, page_size, ctx).await {
            Ok(page) => {
                if !page.pools.is_empty() {
                    info!(
                        "Discovered {} pools (offset {} -> {}) in {}ms",
                        page.pools.len(),
                        cursor.offset,
                        page.cursor.offset,
                        started.elapsed().as_millis()
                    );
                }
                Ok(page)
            }
            Err(source) => {
                warn!("Discovery failed at offset {}: {}", cursor.offset, source);
                Err(DiscoveryError::new(cursor, source))
            }
        }
    }

    async fn next_page(
        &self,
        cursor: DiscoveryCursor,
        page_size: u64,
        ctx: &RequestContext,
    ) -> Result<DiscoveryPage, ReplicaError> {
        if page_size == 0 {
            return Err(ReplicaError::InvalidPageSize);
        }

        let total = self.pools_length(ctx).await?;
        if cursor.offset == total {
            return Ok(DiscoveryPage { pools: Vec::new(), cursor });
        }

        let mut offset = cursor.offset;
        if offset > total {
            info!(
                "Resetting discovery offset {} to 0: factory now lists {} pools",
                offset, total
            );
            offset = 0;
            if total == 0 {
                return Ok(DiscoveryPage {
                    pools: Vec::new(),
                    cursor: DiscoveryCursor::new(0),
                });
            }
        }

        let batch = page_size.min(total - offset);
        let addresses = self.pools_slice(offset, offset + batch, ctx).await?;
        if addresses.len() as u64 != batch {
            return Err(ReplicaError::Malformed(format!(
                "poolsSlice({}, {}) returned {} addresses",
                offset,
                offset + batch,
                addresses.len()
            )));
        }

        let pools = self.read_static(&addresses, ctx).await?;
        Ok(DiscoveryPage {
            pools,
            cursor: DiscoveryCursor::new(offset + batch),
        })
    }

    // Routed through the batch seam like every other read, so the count
    // honours the same context and block-pinned aggregate as the page reads
    async fn pools_length(&self, ctx: &RequestContext) -> Result<u64, ReplicaError> {
        let calls = vec![sub_call(self.factory, &IEulerSwapFactory::poolsLengthCall {})];
        let response = ctx.run(self.caller.aggregate(calls, None)).await?;
        let length = response.decode::<IEulerSwapFactory::poolsLengthCall>(0)?;
        u64::try_from(length)
            .map_err(|_| ReplicaError::Malformed(format!("pool count {} out of range", length)))
    }

    async fn pools_slice(
        &self,
        start: u64,
        end: u64,
        ctx: &RequestContext,
    ) -> Result<Vec<Address>, ReplicaError> {
        let call = IEulerSwapFactory::poolsSliceCall {
            start: U256::from(start),
            end: U256::from(end),
        };
        let response = ctx
            .run(self.caller.aggregate(vec![sub_call(self.factory, &call)], None))
            .await?;
        response.decode::<IEulerSwapFactory::poolsSliceCall>(0)
    }

    async fn read_static(
        &self,
        addresses: &[Address],
        ctx: &RequestContext,
    ) -> Result<Vec<DiscoveredPool>, ReplicaError> {
        let mut calls = Vec::with_capacity(addresses.len() * CALLS_PER_POOL);
        for &pool in addresses {
            calls.push(sub_call(pool, &IEulerSwap::getAssetsCall {}));
            calls.push(sub_call(pool, &IEulerSwap::getParamsCall {}));
            calls.push(sub_call(pool, &IEulerSwap::EVCCall {}));
        }

        let response = ctx.run(self.caller.aggregate(calls, None)).await?;
        let discovered_at = Utc::now();

        let mut pools = Vec::with_capacity(addresses.len());
        for (i, &address) in addresses.iter().enumerate() {
            let base = i * CALLS_PER_POOL;
            let assets = response.decode::<IEulerSwap::getAssetsCall>(base)?;
            let params = response.decode::<IEulerSwap::getParamsCall>(base + 1)?;
            let evc = response.decode::<IEulerSwap::EVCCall>(base + 2)?;

            pools.push(DiscoveredPool {
                descriptor: PoolStaticDescriptor {
                    address,
                    token0: assets.asset0,
                    token1: assets.asset1,
                    vault0: params.vault0,
                    vault1: params.vault1,
                    euler_account: params.eulerAccount,
                    equilibrium_reserve0: U256::from(params.equilibriumReserve0),
                    equilibrium_reserve1: U256::from(params.equilibriumReserve1),
                    price_x: params.priceX,
                    price_y: params.priceY,
                    concentration_x: params.concentrationX,
                    concentration_y: params.concentrationY,
                    fee: params.fee,
                    protocol_fee: params.protocolFee,
                    protocol_fee_recipient: params.protocolFeeRecipient,
                    evc,
                },
                reserve0: U256::ZERO,
                reserve1: U256::ZERO,
                discovered_at,
            });
        }
        Ok(pools)
    }
}
