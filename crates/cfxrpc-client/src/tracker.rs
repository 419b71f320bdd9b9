//! Receipt polling for submitted transactions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use cfxrpc_core::types::TransactionReceipt;

use crate::cfx::CfxClient;
use crate::error::ClientError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay before the first poll and between polls. Zero means the 2s default.
    pub poll_interval: Duration,
    /// Overall deadline, measured from the start of tracking.
    pub timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Duration::from_secs(3600),
        }
    }
}

impl TrackerConfig {
    pub fn effective_poll_interval(&self) -> Duration {
        if self.poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            self.poll_interval
        }
    }
}

/// Terminal state of a tracked transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Confirmed(TransactionReceipt),
    Failed {
        receipt: TransactionReceipt,
        message: String,
    },
    TimedOut,
}

impl Outcome {
    /// Successful receipt, or the matching confirmation error.
    pub fn into_receipt(self, hash: B256, timeout: Duration) -> Result<TransactionReceipt, ClientError> {
        match self {
            Self::Confirmed(receipt) => Ok(receipt),
            Self::Failed { receipt, message } => Err(ClientError::ExecutionFailed {
                hash,
                message,
                receipt: Box::new(receipt),
            }),
            Self::TimedOut => Err(ClientError::DeploymentTimeout { hash, timeout }),
        }
    }
}

/// Polls `cfx_getTransactionReceipt` until the transaction is executed or
/// the deadline passes.
///
/// A missing receipt and a failed poll both mean "keep polling". When the
/// deadline and a poll are ready at the same time, the deadline wins.
#[derive(Clone)]
pub struct ConfirmationTracker {
    cfx: Arc<CfxClient>,
    config: TrackerConfig,
}

impl ConfirmationTracker {
    pub fn new(cfx: Arc<CfxClient>, config: TrackerConfig) -> Self {
        Self { cfx, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Track `hash` inline.
    pub async fn wait_for_receipt(&self, hash: B256) -> Outcome {
        let started = Instant::now();
        let deadline = tokio::time::sleep_until(started + self.config.timeout);
        tokio::pin!(deadline);

        let period = self.config.effective_poll_interval();
        let mut ticker = tokio::time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut polls = 0u32;
        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                _ = ticker.tick() => {}
            }

            polls += 1;
            let receipt = tokio::select! {
                biased;
                _ = &mut deadline => break,
                receipt = self.cfx.transaction_receipt(hash) => receipt,
            };

            match receipt {
                Ok(Some(receipt)) if receipt.is_success() => {
                    tracing::debug!(%hash, polls, "transaction confirmed");
                    return Outcome::Confirmed(receipt);
                }
                Ok(Some(receipt)) => {
                    let message = receipt.failure_message();
                    tracing::debug!(%hash, polls, %message, "transaction failed");
                    return Outcome::Failed { receipt, message };
                }
                Ok(None) => tracing::trace!(%hash, polls, "receipt not available yet"),
                Err(e) => tracing::warn!(%hash, polls, error = %e, "receipt poll failed"),
            }
        }

        tracing::warn!(%hash, polls, timeout_s = self.config.timeout.as_secs(), "confirmation timed out");
        Outcome::TimedOut
    }

    /// Track `hash` on a background task.
    pub fn spawn(&self, hash: B256) -> PendingConfirmation {
        let (tx, rx) = oneshot::channel();
        let tracker = self.clone();
        tokio::spawn(async move {
            let outcome = tracker.wait_for_receipt(hash).await;
            // receiver may already be gone
            let _ = tx.send(outcome);
        });
        PendingConfirmation { hash, rx }
    }
}

/// Handle to a background confirmation; yields its outcome exactly once.
#[derive(Debug)]
pub struct PendingConfirmation {
    hash: B256,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingConfirmation {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub async fn wait(self) -> Result<Outcome, ClientError> {
        self.await
    }
}

impl Future for PendingConfirmation {
    type Output = Result<Outcome, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| ClientError::Cancelled))
    }
}
