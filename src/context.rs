//! Request Context
//!
//! Cancellation and deadline carried into every remote operation.
//! A cancelled or expired request resolves to an error and leaves no
//! partial state behind: the wrapped future is simply dropped.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use crate::error::ReplicaError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context that is only ever cancelled through `token`
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    /// Child context with a deadline `timeout` from now. Cancelling the
    /// parent token cancels the child; the earlier deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(match self.deadline {
                Some(existing) => existing.min(deadline),
                None => deadline,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drive `fut` to completion unless the context is cancelled or the
    /// deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ReplicaError>
    where
        F: Future<Output = Result<T, ReplicaError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ReplicaError::Cancelled);
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| ReplicaError::DeadlineExceeded)?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReplicaError::Cancelled),
            result = bounded => result,
        }
    }
}
