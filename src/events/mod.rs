//! Progress events emitted by the transfer workflow
//!
//! The workflow never logs or records metrics directly. It reports each step to an
//! injected `TransferObserver`, and the binary decides what to do with the events.

use crate::tx::TokenAmount;

use ethers::types::{Address, H256, U256};
use ethers::utils::format_ether;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Steps reported by the transfer workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransferEvent {
    /// Run accepted, nothing read yet
    TransferStarted {
        source: String,
        destination: String,
        amount: U256,
        recipient: Address,
    },

    /// Existing allowance already covers the amount
    AllowanceSufficient {
        network: String,
        allowance: U256,
        required: U256,
    },

    /// Approval for exactly the transfer amount submitted
    ApprovalSubmitted {
        network: String,
        amount: U256,
        tx_hash: H256,
    },

    ApprovalConfirmed {
        network: String,
        tx_hash: H256,
        block_number: u64,
    },

    /// Peer already registered in this direction
    PeerAlreadyLinked { from: String, to: String },

    PeerRegistrationSubmitted {
        from: String,
        to: String,
        tx_hash: H256,
    },

    PeerRegistered {
        from: String,
        to: String,
        tx_hash: H256,
        block_number: u64,
    },

    /// Native fee returned by `quoteSend`
    FeeQuoted { network: String, native_fee: U256 },

    SendSubmitted { network: String, tx_hash: H256 },

    SendConfirmed {
        network: String,
        tx_hash: H256,
        block_number: u64,
    },

    /// Post-transfer token balance
    BalanceReported {
        network: String,
        account: Address,
        balance: U256,
    },

    /// Balance read failed; the transfer result is unaffected
    BalanceUnavailable {
        network: String,
        account: Address,
        reason: String,
    },
}

impl TransferEvent {
    /// Network the event happened on (the `from` side for peering)
    pub fn network(&self) -> &str {
        match self {
            TransferEvent::TransferStarted { source, .. } => source,
            TransferEvent::AllowanceSufficient { network, .. } => network,
            TransferEvent::ApprovalSubmitted { network, .. } => network,
            TransferEvent::ApprovalConfirmed { network, .. } => network,
            TransferEvent::PeerAlreadyLinked { from, .. } => from,
            TransferEvent::PeerRegistrationSubmitted { from, .. } => from,
            TransferEvent::PeerRegistered { from, .. } => from,
            TransferEvent::FeeQuoted { network, .. } => network,
            TransferEvent::SendSubmitted { network, .. } => network,
            TransferEvent::SendConfirmed { network, .. } => network,
            TransferEvent::BalanceReported { network, .. } => network,
            TransferEvent::BalanceUnavailable { network, .. } => network,
        }
    }

    /// Get event name for metrics
    pub fn name(&self) -> &'static str {
        match self {
            TransferEvent::TransferStarted { .. } => "transfer_started",
            TransferEvent::AllowanceSufficient { .. } => "allowance_sufficient",
            TransferEvent::ApprovalSubmitted { .. } => "approval_submitted",
            TransferEvent::ApprovalConfirmed { .. } => "approval_confirmed",
            TransferEvent::PeerAlreadyLinked { .. } => "peer_already_linked",
            TransferEvent::PeerRegistrationSubmitted { .. } => "peer_registration_submitted",
            TransferEvent::PeerRegistered { .. } => "peer_registered",
            TransferEvent::FeeQuoted { .. } => "fee_quoted",
            TransferEvent::SendSubmitted { .. } => "send_submitted",
            TransferEvent::SendConfirmed { .. } => "send_confirmed",
            TransferEvent::BalanceReported { .. } => "balance_reported",
            TransferEvent::BalanceUnavailable { .. } => "balance_unavailable",
        }
    }
}

/// Sink for workflow progress
pub trait TransferObserver: Send + Sync {
    fn on_event(&self, event: &TransferEvent);
}

/// Writes each event as a log line
pub struct TracingObserver {
    token_decimals: u32,
}

impl TracingObserver {
    pub fn new(token_decimals: u32) -> Self {
        Self { token_decimals }
    }

    fn tokens(&self, value: U256) -> String {
        TokenAmount::format(value, self.token_decimals)
    }
}

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::TransferStarted {
                source,
                destination,
                amount,
                recipient,
            } => info!(
                "Starting transfer of {} tokens from {} to {} (recipient {:?})",
                self.tokens(*amount),
                source,
                destination,
                recipient
            ),
            TransferEvent::AllowanceSufficient {
                network,
                allowance,
                required,
            } => info!(
                "Allowance on {} is {} (need {}), skipping approval",
                network,
                self.tokens(*allowance),
                self.tokens(*required)
            ),
            TransferEvent::ApprovalSubmitted {
                network,
                amount,
                tx_hash,
            } => info!(
                "Approving {} tokens for the endpoint on {}; txHash: {:?}",
                self.tokens(*amount),
                network,
                tx_hash
            ),
            TransferEvent::ApprovalConfirmed {
                network,
                block_number,
                ..
            } => info!("Approval confirmed on {} in block {}", network, block_number),
            TransferEvent::PeerAlreadyLinked { from, to } => {
                info!("Peer already set on {} for {}", from, to)
            }
            TransferEvent::PeerRegistrationSubmitted { from, to, tx_hash } => info!(
                "Setting peer on {} for {}; txHash: {:?}",
                from, to, tx_hash
            ),
            TransferEvent::PeerRegistered {
                from,
                to,
                block_number,
                ..
            } => info!("Peer set on {} for {} in block {}", from, to, block_number),
            TransferEvent::FeeQuoted {
                network,
                native_fee,
            } => info!(
                native_fee = %native_fee,
                "Estimated native fee on {}: {}",
                network,
                format_ether(*native_fee)
            ),
            TransferEvent::SendSubmitted { network, tx_hash } => info!(
                tx_hash = ?tx_hash,
                "Token transfer initiated on {}; txHash: {:?}",
                network,
                tx_hash
            ),
            TransferEvent::SendConfirmed {
                network,
                tx_hash,
                block_number,
            } => info!(
                tx_hash = ?tx_hash,
                "Token transfer confirmed on {} in block {}",
                network,
                block_number
            ),
            TransferEvent::BalanceReported {
                network,
                account,
                balance,
            } => info!(
                "Balance of {:?} on {}: {}",
                account,
                network,
                self.tokens(*balance)
            ),
            TransferEvent::BalanceUnavailable {
                network,
                account,
                reason,
            } => warn!(
                "Could not read balance of {:?} on {}: {}",
                account, network, reason
            ),
        }
    }
}

/// Fans every event out to several observers
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn TransferObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl TransferObserver for CompositeObserver {
    fn on_event(&self, event: &TransferEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Keeps every event in memory
#[cfg(test)]
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<TransferEvent>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(TransferEvent::name).collect()
    }
}

#[cfg(test)]
impl TransferObserver for RecordingObserver {
    fn on_event(&self, event: &TransferEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
