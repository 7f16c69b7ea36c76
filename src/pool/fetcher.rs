//! Pool State Fetcher
//!
//! Reads everything a snapshot needs in ONE Multicall3 batch:
//!
//! | index | call |
//! |-------|------|
//! | 0     | `EVC.isAccountOperatorAuthorized(eulerAccount, pool)` |
//! | 1     | `pool.getReserves()` |
//! | 2..10 | vault0: cash, debtOf, maxDeposit, caps, totalBorrows, totalAssets, totalSupply, balanceOf |
//! | 10..18| vault1: same eight calls |
//!
//! Any failing sub-call, transport error or decode error fails the
//! whole fetch. State overrides, when given, make the result speculative.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use super::guard::promote;
use crate::context::RequestContext;
use crate::contracts::{IEulerSwap, IMulticall3, IEVC, IEVault};
use crate::error::ReplicaError;
use crate::multicall::{sub_call, BatchCaller, BatchResponse};
use crate::types::{PoolSnapshot, PoolStaticDescriptor, RawPoolState, RawVaultState};
use alloy::primitives::{Address, U256};
use alloy::rpc::types::state::StateOverride;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Sub-calls issued per vault
const VAULT_CALLS: usize = 8;

/// Total sub-calls per fetch: auth + reserves + 2 vaults
pub const CALLS_PER_FETCH: usize = 2 + 2 * VAULT_CALLS;

pub struct StateFetcher {
    caller: Arc<dyn BatchCaller>,
}

impl StateFetcher {
    pub fn new(caller: Arc<dyn BatchCaller>) -> Self {
        Self { caller }
    }

    /// Read the raw state of one pool atomically
    pub async fn fetch(
        &self,
        descriptor: &PoolStaticDescriptor,
        overrides: Option<&StateOverride>,
        ctx: &RequestContext,
    ) -> Result<RawPoolState, ReplicaError> {
        let calls = build_calls(descriptor);
        let response = ctx.run(self.caller.aggregate(calls, overrides)).await?;
        let raw = decode_response(descriptor, &response, overrides.is_some())?;

        debug!(
            "Fetched pool {:?} @ block {}: reserves ({}, {}), status {}, authorized {}",
            raw.pool, raw.block_number, raw.reserve0, raw.reserve1, raw.status_code, raw.operator_authorized
        );
        Ok(raw)
    }

    /// Fetch, decode and guard one pool
    pub async fn snapshot(
        &self,
        descriptor: &PoolStaticDescriptor,
        overrides: Option<&StateOverride>,
        ctx: &RequestContext,
    ) -> Result<PoolSnapshot, ReplicaError> {
        let raw = self.fetch(descriptor, overrides, ctx).await?;
        Ok(promote(&raw, Utc::now())?)
    }
}

fn vault_calls(vault: Address, account: Address) -> [IMulticall3::Call; VAULT_CALLS] {
    [
        sub_call(vault, &IEVault::cashCall {}),
        sub_call(vault, &IEVault::debtOfCall { account }),
        sub_call(vault, &IEVault::maxDepositCall { account }),
        sub_call(vault, &IEVault::capsCall {}),
        sub_call(vault, &IEVault::totalBorrowsCall {}),
        sub_call(vault, &IEVault::totalAssetsCall {}),
        sub_call(vault, &IEVault::totalSupplyCall {}),
        sub_call(vault, &IEVault::balanceOfCall { account }),
    ]
}

fn build_calls(descriptor: &PoolStaticDescriptor) -> Vec<IMulticall3::Call> {
    let mut calls = Vec::with_capacity(CALLS_PER_FETCH);
    calls.push(sub_call(
        descriptor.evc,
        &IEVC::isAccountOperatorAuthorizedCall {
            account: descriptor.euler_account,
            operator: descriptor.address,
        },
    ));
    calls.push(sub_call(descriptor.address, &IEulerSwap::getReservesCall {}));
    for vault in descriptor.vaults() {
        calls.extend(vault_calls(vault, descriptor.euler_account));
    }
    calls
}

fn decode_vault_response(
    vault: Address,
    response: &BatchResponse,
    base: usize,
) -> Result<RawVaultState, ReplicaError> {
    let caps = response.decode::<IEVault::capsCall>(base + 3)?;
    Ok(RawVaultState {
        vault,
        cash: response.decode::<IEVault::cashCall>(base)?,
        debt: response.decode::<IEVault::debtOfCall>(base + 1)?,
        max_deposit: response.decode::<IEVault::maxDepositCall>(base + 2)?,
        supply_cap: caps.supplyCap,
        borrow_cap: caps.borrowCap,
        total_borrows: response.decode::<IEVault::totalBorrowsCall>(base + 4)?,
        total_assets: response.decode::<IEVault::totalAssetsCall>(base + 5)?,
        total_supply: response.decode::<IEVault::totalSupplyCall>(base + 6)?,
        account_balance: response.decode::<IEVault::balanceOfCall>(base + 7)?,
    })
}

fn decode_response(
    descriptor: &PoolStaticDescriptor,
    response: &BatchResponse,
    speculative: bool,
) -> Result<RawPoolState, ReplicaError> {
    if response.return_data.len() != CALLS_PER_FETCH {
        return Err(ReplicaError::Malformed(format!(
            "expected {} results, got {}",
            CALLS_PER_FETCH,
            response.return_data.len()
        )));
    }

    let operator_authorized = response.decode::<IEVC::isAccountOperatorAuthorizedCall>(0)?;
    let reserves = response.decode::<IEulerSwap::getReservesCall>(1)?;
    let vaults = [
        decode_vault_response(descriptor.vault0, response, 2)?,
        decode_vault_response(descriptor.vault1, response, 2 + VAULT_CALLS)?,
    ];

    Ok(RawPoolState {
        pool: descriptor.address,
        vaults,
        reserve0: U256::from(reserves.reserve0),
        reserve1: U256::from(reserves.reserve1),
        status_code: reserves.status,
        operator_authorized,
        block_number: response.block_number,
        speculative,
    })
}
