//! Error types for the OFT transfer workflow

use ethers::types::H256;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a single chain call
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction {tx_hash:?} reverted")]
    Reverted { tx_hash: H256 },

    #[error("Signer error: {0}")]
    Signer(String),
}

/// Step of a single peer-registration direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeeringStep {
    Query,
    Register,
    Confirm,
}

impl fmt::Display for PeeringStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeeringStep::Query => "peer query",
            PeeringStep::Register => "peer registration",
            PeeringStep::Confirm => "peer confirmation",
        };
        f.write_str(name)
    }
}

/// Which part of the run an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Transfer,
}

/// Main error type for a transfer run
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Deployment artifact for network {network} not found at {path}: {reason}")]
    ArtifactNotFound {
        network: String,
        path: String,
        reason: String,
    },

    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("Chain connection error for network {network}: {message}")]
    ChainConnection { network: String, message: String },

    #[error("Allowance assurance failed on {network}")]
    Allowance {
        network: String,
        #[source]
        source: ChainError,
    },

    #[error("Peering failed for {direction} during {step}")]
    Peering {
        direction: String,
        step: PeeringStep,
        #[source]
        source: ChainError,
    },

    #[error("Fee quotation failed on {network}")]
    Quote {
        network: String,
        #[source]
        source: ChainError,
    },

    #[error("Send failed on {network}")]
    Send {
        network: String,
        #[source]
        source: ChainError,
    },

    #[error("Timed out after {waited:?} waiting for {stage} tx {tx_hash:?} on {network}")]
    ConfirmationTimeout {
        network: String,
        stage: String,
        tx_hash: H256,
        waited: Duration,
    },
}

impl TransferError {
    /// Setup errors happen before any chain state is read
    pub fn phase(&self) -> Phase {
        match self {
            TransferError::Configuration(_)
            | TransferError::ArtifactNotFound { .. }
            | TransferError::InvalidAmount { .. }
            | TransferError::ChainConnection { .. } => Phase::Setup,
            _ => Phase::Transfer,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Configuration(_) => "configuration",
            TransferError::ArtifactNotFound { .. } => "artifact_not_found",
            TransferError::InvalidAmount { .. } => "invalid_amount",
            TransferError::ChainConnection { .. } => "chain_connection",
            TransferError::Allowance { .. } => "allowance",
            TransferError::Peering { .. } => "peering",
            TransferError::Quote { .. } => "quote",
            TransferError::Send { .. } => "send",
            TransferError::ConfirmationTimeout { .. } => "confirmation_timeout",
        }
    }
}

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;
