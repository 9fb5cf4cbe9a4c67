//! Coordination of the cross-chain transfer workflow
//!
//! The coordination layer:
//! 1. Makes sure the endpoint may pull the transfer amount on the source chain
//! 2. Registers each OFT contract as the other's peer, in both directions
//! 3. Quotes the messaging fee and submits the `send` on the source chain
//! 4. Waits for every submitted transaction before moving on

pub mod engine;
pub mod peering;

pub use engine::{TransferEngine, TransferRequest};
pub use peering::PeeringOutcome;

use crate::chain::{ChainInfo, WaitError};
use crate::error::{ChainError, TransferError};

use ethers::types::H256;

/// Map a failed wait: timeouts keep their own variant, chain failures go through `on_chain`
fn wait_failure(
    err: WaitError,
    info: &ChainInfo,
    stage: &str,
    tx_hash: H256,
    on_chain: impl FnOnce(ChainError) -> TransferError,
) -> TransferError {
    match err {
        WaitError::Timeout(waited) => TransferError::ConfirmationTimeout {
            network: info.network.clone(),
            stage: stage.to_string(),
            tx_hash,
            waited,
        },
        WaitError::Chain(e) => on_chain(e),
    }
}
