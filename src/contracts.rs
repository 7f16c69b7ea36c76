//! Centralized Contract Definitions
//!
//! Read-only Solidity interfaces the replica talks to, defined using
//! alloy's `sol!` macro.
//!
//! Each interface is annotated with `#[sol(rpc)]` so contract instance
//! types can be used directly against any alloy Provider. The replica
//! itself mostly uses the generated `*Call` structs to encode sub-calls
//! for Multicall3 and decode their return data.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::{address, Address};
use alloy::sol;

/// Multicall3 deployed address (same on every EVM chain)
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

// ── Multicall3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call {
            address target;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function tryBlockAndAggregate(bool requireSuccess, Call[] calldata calls) external payable returns (uint256 blockNumber, bytes32 blockHash, Result[] memory returnData);
    }
}

// ── EulerSwap ────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IEulerSwapFactory {
        function poolsLength() external view returns (uint256);
        function poolsSlice(uint256 start, uint256 end) external view returns (address[] memory);
    }
}

sol! {
    #[sol(rpc)]
    interface IEulerSwap {
        struct Params {
            address vault0;
            address vault1;
            address eulerAccount;
            uint112 equilibriumReserve0;
            uint112 equilibriumReserve1;
            uint256 priceX;
            uint256 priceY;
            uint256 concentrationX;
            uint256 concentrationY;
            uint256 fee;
            uint256 protocolFee;
            address protocolFeeRecipient;
        }

        function getAssets() external view returns (address asset0, address asset1);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 status);
        function getParams() external view returns (Params memory);
        function EVC() external view returns (address);
    }
}

// ── Ethereum Vault Connector ─────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IEVC {
        function isAccountOperatorAuthorized(address account, address operator) external view returns (bool authorized);
    }
}

// ── Euler Vault Kit ──────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IEVault {
        function cash() external view returns (uint256);
        function debtOf(address account) external view returns (uint256);
        function maxDeposit(address account) external view returns (uint256);
        function caps() external view returns (uint16 supplyCap, uint16 borrowCap);
        function totalBorrows() external view returns (uint256);
        function totalAssets() external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }
}
