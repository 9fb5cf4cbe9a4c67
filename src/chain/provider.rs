//! ethers-backed `TokenBridge` bound to a deployed OFT contract

use super::{ChainContext, ChainInfo, TokenBridge, TxConfirmation};
use crate::config::GasPriceStrategy;
use crate::error::{ChainError, TransferError, TransferResult};
use crate::tx::{MessagingFee, SendParam};

use async_trait::async_trait;
use ethers::abi::{Detokenize, Tokenize};
use ethers::contract::{Contract, ContractError};
use ethers::middleware::signer::SignerMiddlewareError;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// OFT contract client for one network, signing with that network's account
pub struct EvmBridgeClient {
    info: ChainInfo,
    client: Arc<SignerClient>,
    contract: Contract<SignerClient>,
    gas_price_strategy: GasPriceStrategy,
}

impl EvmBridgeClient {
    /// Connect to the context's RPC node and bind its contract
    pub async fn connect(ctx: &ChainContext) -> TransferResult<Self> {
        let connection_error = |message: String| TransferError::ChainConnection {
            network: ctx.network.clone(),
            message,
        };

        let provider = Provider::<Http>::try_from(ctx.rpc_url.as_str())
            .map_err(|e| connection_error(format!("invalid RPC URL: {}", e)))?
            .interval(Duration::from_millis(100));

        let chain_id = match ctx.chain_id {
            Some(id) => id,
            None => provider
                .get_chainid()
                .await
                .map_err(|e| connection_error(format!("eth_chainId failed: {}", e)))?
                .as_u64(),
        };

        let wallet = ctx
            .signing_key
            .expose()
            .parse::<LocalWallet>()
            .map_err(|e| {
                TransferError::Configuration(format!(
                    "Invalid signing key for network {}: {}",
                    ctx.network, e
                ))
            })?
            .with_chain_id(chain_id);
        let signer = wallet.address();

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = Contract::new(ctx.contract_address, ctx.abi.clone(), client.clone());

        info!(
            network = %ctx.network,
            eid = ctx.endpoint_id,
            chain_id,
            contract = ?ctx.contract_address,
            signer = ?signer,
            "Connected to OFT contract"
        );

        Ok(Self {
            info: ChainInfo {
                network: ctx.network.clone(),
                endpoint_id: ctx.endpoint_id,
                contract_address: ctx.contract_address,
                signer,
            },
            client,
            contract,
            gas_price_strategy: ctx.gas_price_strategy,
        })
    }

    /// View call
    async fn read<T, D>(&self, function: &str, args: T) -> Result<D, ChainError>
    where
        T: Tokenize + Send,
        D: Detokenize + Send,
    {
        self.contract
            .method::<T, D>(function, args)
            .map_err(|e| ChainError::Contract(format!("{}: {}", function, e)))?
            .call()
            .await
            .map_err(classify)
    }

    /// Signed state-changing call; returns once the node accepted the transaction
    async fn submit<T>(
        &self,
        function: &str,
        args: T,
        value: Option<U256>,
    ) -> Result<H256, ChainError>
    where
        T: Tokenize + Send,
    {
        let mut call = self
            .contract
            .method::<T, ()>(function, args)
            .map_err(|e| ChainError::Contract(format!("{}: {}", function, e)))?;

        if let Some(value) = value {
            call = call.value(value);
        }
        if self.gas_price_strategy == GasPriceStrategy::Legacy {
            call = call.legacy();
        }

        let pending = call.send().await.map_err(classify)?;
        let tx_hash = pending.tx_hash();

        debug!(
            "Submitted {} on {}: {:?}",
            function, self.info.network, tx_hash
        );
        Ok(tx_hash)
    }
}

#[async_trait]
impl TokenBridge for EvmBridgeClient {
    fn info(&self) -> &ChainInfo {
        &self.info
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ChainError> {
        self.read("allowance", (owner, spender)).await
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<H256, ChainError> {
        self.submit("approve", (spender, amount), None).await
    }

    async fn is_peer(&self, eid: u32, peer: [u8; 32]) -> Result<bool, ChainError> {
        self.read("isPeer", (eid, peer)).await
    }

    async fn set_peer(&self, eid: u32, peer: [u8; 32]) -> Result<H256, ChainError> {
        self.submit("setPeer", (eid, peer), None).await
    }

    async fn quote_send(&self, param: &SendParam) -> Result<MessagingFee, ChainError> {
        let fee: (U256, U256) = self.read("quoteSend", (param.as_tuple(), false)).await?;
        Ok(MessagingFee::from(fee))
    }

    async fn send(
        &self,
        param: &SendParam,
        fee: &MessagingFee,
        refund: Address,
    ) -> Result<H256, ChainError> {
        self.submit(
            "send",
            (param.as_tuple(), fee.as_tuple(), refund),
            Some(fee.native_fee),
        )
        .await
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        self.read("balanceOf", account).await
    }

    async fn confirmation(
        &self,
        tx_hash: H256,
        confirmations: u64,
    ) -> Result<Option<TxConfirmation>, ChainError> {
        let receipt = match self
            .client
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?
        {
            Some(receipt) => receipt,
            None => return Ok(None),
        };

        let block_number = match receipt.block_number {
            Some(block) => block.as_u64(),
            None => return Ok(None),
        };

        if receipt.status == Some(0u64.into()) {
            return Err(ChainError::Reverted { tx_hash });
        }

        let head = self
            .client
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?
            .as_u64();

        // the inclusion block counts as the first confirmation
        let depth = head.saturating_sub(block_number) + 1;
        if depth < confirmations {
            debug!(
                "Transaction {:?} has {} / {} confirmations on {}",
                tx_hash, depth, confirmations, self.info.network
            );
            return Ok(None);
        }

        Ok(Some(TxConfirmation {
            tx_hash,
            block_number,
            block_hash: receipt.block_hash,
            gas_used: receipt.gas_used,
        }))
    }
}

/// Split node/transport failures from contract-level failures
fn classify(e: ContractError<SignerClient>) -> ChainError {
    if e.is_revert() {
        return ChainError::Contract(format!("execution reverted: {}", e));
    }
    match e {
        ContractError::MiddlewareError { e } => match e {
            SignerMiddlewareError::MiddlewareError(inner) => ChainError::Rpc(inner.to_string()),
            other => ChainError::Signer(other.to_string()),
        },
        ContractError::ProviderError { e } => ChainError::Rpc(e.to_string()),
        other => ChainError::Contract(other.to_string()),
    }
}
