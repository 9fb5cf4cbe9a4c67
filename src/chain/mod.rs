//! Chain module - resolved chain contexts and the bridge contract seam
//!
//! This module provides:
//! - `ChainContext`, the immutable per-network bundle built from config and artifacts
//! - `TokenBridge`, the async operations the transfer workflow needs from an OFT contract
//! - An ethers-backed `TokenBridge` and a polling confirmation waiter

pub mod artifacts;
pub mod finality;
pub mod provider;
pub mod resolver;

#[cfg(test)]
pub mod fake;

pub use artifacts::{ArtifactStore, DeploymentArtifact};
pub use finality::{ConfirmationWaiter, WaitError};
pub use provider::EvmBridgeClient;
pub use resolver::ChainResolver;

use crate::config::GasPriceStrategy;
use crate::error::ChainError;
use crate::tx::{MessagingFee, SendParam};

use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::fmt;

/// Private key material for one network. Never printed.
#[derive(Clone)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Everything needed to talk to the OFT deployment on one network
#[derive(Debug, Clone)]
pub struct ChainContext {
    /// Network name as used in configuration and deployment artifacts
    pub network: String,
    /// LayerZero endpoint id (not the EVM chain id)
    pub endpoint_id: u32,
    /// EVM chain id, fetched from the node at connect time when absent
    pub chain_id: Option<u64>,
    pub rpc_url: String,
    pub signing_key: SigningKey,
    pub contract_address: Address,
    pub abi: Abi,
    pub gas_price_strategy: GasPriceStrategy,
}

/// Identity of a connected bridge contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub network: String,
    pub endpoint_id: u32,
    pub contract_address: Address,
    /// Address of the signing account
    pub signer: Address,
}

impl fmt::Display for ChainInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (eid {})", self.network, self.endpoint_id)
    }
}

/// A transaction that reached the requested confirmation depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxConfirmation {
    pub tx_hash: H256,
    pub block_number: u64,
    pub block_hash: Option<H256>,
    pub gas_used: Option<U256>,
}

/// OFT contract operations used by the transfer workflow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenBridge: Send + Sync {
    fn info(&self) -> &ChainInfo;

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ChainError>;

    async fn approve(&self, spender: Address, amount: U256) -> Result<H256, ChainError>;

    async fn is_peer(&self, eid: u32, peer: [u8; 32]) -> Result<bool, ChainError>;

    async fn set_peer(&self, eid: u32, peer: [u8; 32]) -> Result<H256, ChainError>;

    async fn quote_send(&self, param: &SendParam) -> Result<MessagingFee, ChainError>;

    /// Submit `send` with `fee.native_fee` attached as value
    async fn send(
        &self,
        param: &SendParam,
        fee: &MessagingFee,
        refund: Address,
    ) -> Result<H256, ChainError>;

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError>;

    /// Single poll: `None` while the transaction is unknown, pending, or too shallow
    async fn confirmation(
        &self,
        tx_hash: H256,
        confirmations: u64,
    ) -> Result<Option<TxConfirmation>, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_redacted() {
        let key = SigningKey::new("0xdeadbeef");
        assert_eq!(format!("{:?}", key), "SigningKey(<redacted>)");
        assert_eq!(key.expose(), "0xdeadbeef");
    }

    #[test]
    fn test_chain_info_display() {
        let info = ChainInfo {
            network: "sepolia".into(),
            endpoint_id: 40161,
            contract_address: Address::zero(),
            signer: Address::zero(),
        };
        assert_eq!(info.to_string(), "sepolia (eid 40161)");
    }
}
