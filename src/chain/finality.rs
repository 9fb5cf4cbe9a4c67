//! Bounded confirmation waiting
//!
//! Every submitted transaction is followed by a blocking wait before the next
//! step runs. The wait polls the receipt until the requested depth is reached
//! and gives up after a fixed timeout instead of hanging on a dropped tx.

use super::{TokenBridge, TxConfirmation};
use crate::config::TransferConfig;
use crate::error::ChainError;

use ethers::types::H256;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("no confirmation after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Waits for transactions to reach a confirmation depth
#[derive(Debug, Clone)]
pub struct ConfirmationWaiter {
    confirmations: u64,
    timeout: Duration,
    poll_interval: Duration,
}

impl ConfirmationWaiter {
    pub fn new(confirmations: u64, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            confirmations: confirmations.max(1),
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(
            config.confirmations,
            Duration::from_secs(config.confirmation_timeout_secs),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    /// Block until `tx_hash` has `confirmations` blocks on `bridge`'s chain
    pub async fn wait(
        &self,
        bridge: &dyn TokenBridge,
        tx_hash: H256,
    ) -> Result<TxConfirmation, WaitError> {
        let started = Instant::now();
        let network = &bridge.info().network;

        let polling = async {
            loop {
                let polled = bridge.confirmation(tx_hash, self.confirmations).await?;
                if let Some(confirmation) = polled {
                    return Ok::<_, ChainError>(confirmation);
                }
                debug!(
                    "Waiting for {:?} on {} ({} confirmations required)",
                    tx_hash, network, self.confirmations
                );
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.timeout, polling).await {
            Ok(Ok(confirmation)) => {
                let elapsed = started.elapsed();
                crate::metrics::record_confirmation_latency(network, elapsed.as_secs_f64());
                info!(
                    "Transaction {:?} confirmed on {} in block {} after {:.1}s",
                    tx_hash,
                    network,
                    confirmation.block_number,
                    elapsed.as_secs_f64()
                );
                Ok(confirmation)
            }
            Ok(Err(e)) => Err(WaitError::Chain(e)),
            Err(_) => Err(WaitError::Timeout(self.timeout)),
        }
    }
}
