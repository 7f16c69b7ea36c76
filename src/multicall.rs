//! Multicall3 Batched Reads
//!
//! Every remote read the replica makes goes through one
//! `tryBlockAndAggregate(requireSuccess = true, calls)` request, so all
//! fields of a batch are observed at the same block and a single failing
//! sub-call fails the whole batch.
//!
//! `BatchCaller` is the seam: `MulticallClient` talks to a node through
//! an alloy Provider, tests substitute an in-memory caller.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use crate::contracts::IMulticall3;
use crate::error::ReplicaError;
use alloy::primitives::{Address, Bytes};
use alloy::providers::Provider;
use alloy::rpc::types::state::StateOverride;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Return data of a successful batch, in call order
#[derive(Debug, Clone)]
pub struct BatchResponse {
    pub block_number: u64,
    pub return_data: Vec<Bytes>,
}

impl BatchResponse {
    /// Decode the return data of sub-call `index` as `C`'s return type
    pub fn decode<C: SolCall>(&self, index: usize) -> Result<C::Return, ReplicaError> {
        let data = self.return_data.get(index).ok_or_else(|| {
            ReplicaError::Malformed(format!(
                "missing return data for sub-call {} of {}",
                index,
                self.return_data.len()
            ))
        })?;
        Ok(C::abi_decode_returns(data)?)
    }
}

/// Encode one sub-call
pub fn sub_call<C: SolCall>(target: Address, call: &C) -> IMulticall3::Call {
    IMulticall3::Call {
        target,
        callData: call.abi_encode().into(),
    }
}

/// Executes a batch of read-only calls atomically at one block height.
#[async_trait]
pub trait BatchCaller: Send + Sync {
    /// Run `calls` in one request. `overrides` apply to this request only.
    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call>,
        overrides: Option<&StateOverride>,
    ) -> Result<BatchResponse, ReplicaError>;
}

/// `BatchCaller` backed by a deployed Multicall3 contract
pub struct MulticallClient<P> {
    provider: Arc<P>,
    address: Address,
}

impl<P: Provider + 'static> MulticallClient<P> {
    pub fn new(provider: Arc<P>, address: Address) -> Self {
        Self { provider, address }
    }
}

#[async_trait]
impl<P: Provider + 'static> BatchCaller for MulticallClient<P> {
    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call>,
        overrides: Option<&StateOverride>,
    ) -> Result<BatchResponse, ReplicaError> {
        let targets: Vec<Address> = calls.iter().map(|c| c.target).collect();
        debug!("Multicall3 batch: {} sub-calls (overrides: {})", targets.len(), overrides.is_some());

        let multicall = IMulticall3::new(self.address, Arc::clone(&self.provider));
        let mut request = multicall.tryBlockAndAggregate(true, calls);
        if let Some(overrides) = overrides {
            request = request.state(overrides.clone());
        }
        let result = request.call().await?;

        if result.returnData.len() != targets.len() {
            return Err(ReplicaError::Malformed(format!(
                "Multicall3 returned {} results for {} calls",
                result.returnData.len(),
                targets.len()
            )));
        }

        let mut return_data = Vec::with_capacity(targets.len());
        for (index, (sub, target)) in result.returnData.into_iter().zip(targets).enumerate() {
            if !sub.success {
                return Err(ReplicaError::CallFailed { index, target });
            }
            return_data.push(sub.returnData);
        }

        let block_number = u64::try_from(result.blockNumber)
            .map_err(|_| ReplicaError::Malformed(format!("block number {} out of range", result.blockNumber)))?;

        Ok(BatchResponse {
            block_number,
            return_data,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory `BatchCaller` answering sub-calls from a closure

    use super::*;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    type Responder = Box<dyn Fn(&IMulticall3::Call) -> Option<Bytes> + Send + Sync>;

    pub(crate) struct MockCaller {
        responder: Responder,
        block_number: u64,
        /// Sub-call count of every batch received
        pub batches: Mutex<Vec<usize>>,
        /// Whether each batch carried overrides
        pub overrides_seen: Mutex<Vec<bool>>,
        /// Fail the batch with this (zero-based) index as a transport-level error
        pub fail_batch: Option<usize>,
        /// Never answer the batch with this index
        pub stall_batch: Option<usize>,
        /// Cancelled when the stalled batch arrives
        stall_token: Option<CancellationToken>,
    }

    impl MockCaller {
        /// `responder` returns `None` to make a sub-call fail
        pub(crate) fn new<F>(block_number: u64, responder: F) -> Self
        where
            F: Fn(&IMulticall3::Call) -> Option<Bytes> + Send + Sync + 'static,
        {
            Self {
                responder: Box::new(responder),
                block_number,
                batches: Mutex::new(Vec::new()),
                overrides_seen: Mutex::new(Vec::new()),
                fail_batch: None,
                stall_batch: None,
                stall_token: None,
            }
        }

        pub(crate) fn failing_batch(mut self, index: usize) -> Self {
            self.fail_batch = Some(index);
            self
        }

        /// Leave batch `index` pending forever, cancelling `token` (if any)
        /// once it arrives
        pub(crate) fn stalling_batch(mut self, index: usize, token: Option<CancellationToken>) -> Self {
            self.stall_batch = Some(index);
            self.stall_token = token;
            self
        }

        pub(crate) fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchCaller for MockCaller {
        async fn aggregate(
            &self,
            calls: Vec<IMulticall3::Call>,
            overrides: Option<&StateOverride>,
        ) -> Result<BatchResponse, ReplicaError> {
            let batch_index = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(calls.len());
                batches.len() - 1
            };
            self.overrides_seen.lock().unwrap().push(overrides.is_some());

            if self.fail_batch == Some(batch_index) {
                return Err(ReplicaError::Malformed("injected transport failure".into()));
            }
            if self.stall_batch == Some(batch_index) {
                if let Some(token) = &self.stall_token {
                    token.cancel();
                }
                return std::future::pending().await;
            }

            let mut return_data = Vec::with_capacity(calls.len());
            for (index, call) in calls.iter().enumerate() {
                match (self.responder)(call) {
                    Some(data) => return_data.push(data),
                    None => {
                        return Err(ReplicaError::CallFailed {
                            index,
                            target: call.target,
                        })
                    }
                }
            }
            Ok(BatchResponse {
                block_number: self.block_number,
                return_data,
            })
        }
    }

    /// First four bytes of a sub-call's calldata
    pub(crate) fn selector(call: &IMulticall3::Call) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&call.callData[..4]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{selector, MockCaller};
    use super::*;
    use crate::contracts::IEVault;
    use alloy::primitives::{B256, U256};
    use alloy::providers::ProviderBuilder;
    use alloy::rpc::types::state::AccountOverride;
    use alloy::transports::mock::Asserter;

    /// Client over a mocked transport that answers the next `eth_call`
    /// with the given Multicall3 result
    fn client_answering(
        block: u64,
        results: Vec<IMulticall3::Result>,
    ) -> MulticallClient<impl Provider + 'static> {
        let asserter = Asserter::new();
        let encoded = IMulticall3::tryBlockAndAggregateCall::abi_encode_returns(
            &IMulticall3::tryBlockAndAggregateReturn {
                blockNumber: U256::from(block),
                blockHash: B256::ZERO,
                returnData: results,
            },
        );
        asserter.push_success(&Bytes::from(encoded));
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter);
        MulticallClient::new(Arc::new(provider), crate::contracts::MULTICALL3_ADDRESS)
    }

    fn ok_result(data: Vec<u8>) -> IMulticall3::Result {
        IMulticall3::Result {
            success: true,
            returnData: data.into(),
        }
    }

    #[tokio::test]
    async fn test_client_with_overrides() {
        let vault = Address::repeat_byte(0x33);
        let client = client_answering(
            4242,
            vec![ok_result(IEVault::cashCall::abi_encode_returns(&U256::from(9u64)))],
        );

        let mut overrides = StateOverride::default();
        overrides.insert(
            vault,
            AccountOverride {
                balance: Some(U256::from(1u64)),
                ..Default::default()
            },
        );

        let response = client
            .aggregate(vec![sub_call(vault, &IEVault::cashCall {})], Some(&overrides))
            .await
            .unwrap();
        assert_eq!(response.block_number, 4242);
        assert_eq!(response.decode::<IEVault::cashCall>(0).unwrap(), U256::from(9u64));
    }

    #[tokio::test]
    async fn test_client_rejects_short_result() {
        let vault = Address::repeat_byte(0x44);
        let client = client_answering(7, Vec::new());
        let err = client
            .aggregate(vec![sub_call(vault, &IEVault::cashCall {})], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReplicaError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_client_failed_sub_call() {
        let vault = Address::repeat_byte(0x55);
        let client = client_answering(
            7,
            vec![IMulticall3::Result {
                success: false,
                returnData: Bytes::new(),
            }],
        );
        let err = client
            .aggregate(vec![sub_call(vault, &IEVault::cashCall {})], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReplicaError::CallFailed { index: 0, target } if target == vault));
    }

    #[tokio::test]
    async fn test_client_rpc_error_is_transport() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("header not found");
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter);
        let client = MulticallClient::new(Arc::new(provider), crate::contracts::MULTICALL3_ADDRESS);

        let err = client
            .aggregate(vec![sub_call(Address::repeat_byte(0x66), &IEVault::cashCall {})], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReplicaError::Transport(_)));
    }

    #[tokio::test]
    async fn test_decode_by_index() {
        let vault = Address::repeat_byte(0x11);
        let caller = MockCaller::new(100, |call| {
            if selector(call) == IEVault::cashCall::SELECTOR {
                Some(IEVault::cashCall::abi_encode_returns(&U256::from(77u64)).into())
            } else {
                None
            }
        });

        let response = caller
            .aggregate(vec![sub_call(vault, &IEVault::cashCall {})], None)
            .await
            .unwrap();
        assert_eq!(response.block_number, 100);
        assert_eq!(response.decode::<IEVault::cashCall>(0).unwrap(), U256::from(77u64));
        assert!(matches!(
            response.decode::<IEVault::cashCall>(1),
            Err(ReplicaError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_sub_call_reports_index() {
        let vault = Address::repeat_byte(0x22);
        let caller = MockCaller::new(1, |call| {
            (selector(call) == IEVault::cashCall::SELECTOR)
                .then(|| IEVault::cashCall::abi_encode_returns(&U256::ZERO).into())
        });
        let calls = vec![
            sub_call(vault, &IEVault::cashCall {}),
            sub_call(vault, &IEVault::totalSupplyCall {}),
        ];
        let err = caller.aggregate(calls, None).await.unwrap_err();
        assert!(matches!(err, ReplicaError::CallFailed { index: 1, target } if target == vault));
    }

    #[test]
    fn test_garbage_return_data_is_abi_error() {
        let response = BatchResponse {
            block_number: 1,
            return_data: vec![Bytes::from_static(&[1, 2, 3])],
        };
        assert!(matches!(
            response.decode::<IEVault::cashCall>(0),
            Err(ReplicaError::Abi(_))
        ));
    }
}
