//! Transfer orchestration: allowance, peering, fee quote, send, confirmation

use super::peering::{DirectionOutcome, PeerCoordinator, PeeringOutcome};
use super::wait_failure;
use crate::chain::{ConfirmationWaiter, TokenBridge};
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::events::{TransferEvent, TransferObserver};
use crate::tx::{ExecutorOptions, MessagingFee, SendParam, TokenAmount};

use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One transfer between two connected OFT deployments
#[derive(Clone)]
pub struct TransferRequest {
    pub amount: TokenAmount,
    pub source: Arc<dyn TokenBridge>,
    pub destination: Arc<dyn TokenBridge>,
    /// Defaults to the destination chain's signer
    pub recipient: Option<Address>,
}

impl TransferRequest {
    pub fn recipient(&self) -> Address {
        self.recipient
            .unwrap_or_else(|| self.destination.info().signer)
    }
}

/// Summary of a confirmed `send`
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub run_id: Uuid,
    pub source_network: String,
    pub destination_network: String,
    pub destination_eid: u32,
    pub recipient: Address,
    /// Human-readable amount
    pub amount: String,
    pub amount_base_units: U256,
    pub approval_tx: Option<H256>,
    pub peer_registrations: Vec<DirectionOutcome>,
    pub native_fee: U256,
    pub tx_hash: H256,
    pub block_number: u64,
    pub block_hash: Option<H256>,
    /// Source signer's balance after the send, if it could be read
    pub source_balance: Option<U256>,
    /// Recipient's balance on the destination chain. Delivery is asynchronous,
    /// so this is usually the balance before the tokens arrive.
    pub destination_balance: Option<U256>,
    pub completed_at: DateTime<Utc>,
}

impl TransferReceipt {
    /// Number of `setPeer` transactions this run submitted
    pub fn peers_registered(&self) -> usize {
        self.peer_registrations
            .iter()
            .filter(|d| matches!(d.outcome, PeeringOutcome::Registered(_)))
            .count()
    }
}

/// Drives the transfer workflow against two `TokenBridge`s
pub struct TransferEngine {
    /// Contract allowed to pull tokens from the source signer
    spender: Address,
    extra_options: Bytes,
    waiter: ConfirmationWaiter,
    peers: PeerCoordinator,
    observer: Arc<dyn TransferObserver>,
}

impl TransferEngine {
    pub fn new(
        config: &TransferConfig,
        observer: Arc<dyn TransferObserver>,
    ) -> TransferResult<Self> {
        let spender = config.endpoint_address.parse::<Address>().map_err(|e| {
            TransferError::Configuration(format!(
                "Invalid endpoint address {:?}: {}",
                config.endpoint_address, e
            ))
        })?;

        let options = ExecutorOptions::new().lz_receive(
            u128::from(config.executor_gas_limit),
            u128::from(config.executor_native_value),
        );
        debug!("Executor options: {}", options.to_hex());

        let waiter = ConfirmationWaiter::from_config(config);
        let peers = PeerCoordinator::new(waiter.clone(), observer.clone());

        Ok(Self {
            spender,
            extra_options: options.to_bytes(),
            waiter,
            peers,
            observer,
        })
    }

    pub fn peers(&self) -> &PeerCoordinator {
        &self.peers
    }

    /// Run the full workflow and return once the `send` is confirmed on the source chain
    ///
    /// Every step checks chain state first, so rerunning after a partial failure
    /// only submits what is still missing.
    pub async fn transfer(&self, request: &TransferRequest) -> TransferResult<TransferReceipt> {
        let run_id = Uuid::new_v4();
        let source = request.source.as_ref();
        let destination = request.destination.as_ref();
        let recipient = request.recipient();

        check_distinct(source, destination)?;

        info!(
            run_id = %run_id,
            source = %source.info(),
            destination = %destination.info(),
            "Starting OFT transfer"
        );
        self.observer.on_event(&TransferEvent::TransferStarted {
            source: source.info().network.clone(),
            destination: destination.info().network.clone(),
            amount: request.amount.base_units(),
            recipient,
        });

        let approval_tx = self.ensure_allowance(source, &request.amount).await?;

        let peer_registrations = self.peers.ensure_mutual_peering(source, destination).await?;

        let param = self.send_param(destination, recipient, &request.amount);
        let fee = self.quote_fee(source, &param).await?;

        let refund = source.info().signer;
        let tx_hash = source
            .send(&param, &fee, refund)
            .await
            .map_err(|e| TransferError::Send {
                network: source.info().network.clone(),
                source: e,
            })?;
        self.observer.on_event(&TransferEvent::SendSubmitted {
            network: source.info().network.clone(),
            tx_hash,
        });

        let confirmation = self
            .waiter
            .wait(source, tx_hash)
            .await
            .map_err(|e| {
                wait_failure(e, source.info(), "send", tx_hash, |err| TransferError::Send {
                    network: source.info().network.clone(),
                    source: err,
                })
            })?;
        self.observer.on_event(&TransferEvent::SendConfirmed {
            network: source.info().network.clone(),
            tx_hash,
            block_number: confirmation.block_number,
        });

        let (source_balance, destination_balance) = tokio::join!(
            self.report_balance(source, source.info().signer),
            self.report_balance(destination, recipient),
        );

        Ok(TransferReceipt {
            run_id,
            source_network: source.info().network.clone(),
            destination_network: destination.info().network.clone(),
            destination_eid: destination.info().endpoint_id,
            recipient,
            amount: request.amount.to_string(),
            amount_base_units: request.amount.base_units(),
            approval_tx,
            peer_registrations,
            native_fee: fee.native_fee,
            tx_hash,
            block_number: confirmation.block_number,
            block_hash: confirmation.block_hash,
            source_balance,
            destination_balance,
            completed_at: Utc::now(),
        })
    }

    /// Quote the messaging fee without submitting anything
    ///
    /// Peers must already be registered, otherwise the contract rejects the quote.
    pub async fn quote(&self, request: &TransferRequest) -> TransferResult<MessagingFee> {
        let source = request.source.as_ref();
        let destination = request.destination.as_ref();
        check_distinct(source, destination)?;

        let param = self.send_param(destination, request.recipient(), &request.amount);
        self.quote_fee(source, &param).await
    }

    /// Approve exactly `amount` for the endpoint unless the current allowance covers it
    async fn ensure_allowance(
        &self,
        source: &dyn TokenBridge,
        amount: &TokenAmount,
    ) -> TransferResult<Option<H256>> {
        let info = source.info();
        let allowance_error = |e| TransferError::Allowance {
            network: info.network.clone(),
            source: e,
        };

        let required = amount.base_units();
        let current = source
            .allowance(info.signer, self.spender)
            .await
            .map_err(allowance_error)?;

        if current >= required {
            self.observer.on_event(&TransferEvent::AllowanceSufficient {
                network: info.network.clone(),
                allowance: current,
                required,
            });
            return Ok(None);
        }

        debug!(
            "Allowance {} below {} on {}, approving endpoint {:?}",
            current, required, info.network, self.spender
        );

        let tx_hash = source
            .approve(self.spender, required)
            .await
            .map_err(allowance_error)?;
        self.observer.on_event(&TransferEvent::ApprovalSubmitted {
            network: info.network.clone(),
            amount: required,
            tx_hash,
        });

        let confirmation = self
            .waiter
            .wait(source, tx_hash)
            .await
            .map_err(|e| wait_failure(e, info, "approval", tx_hash, allowance_error))?;
        self.observer.on_event(&TransferEvent::ApprovalConfirmed {
            network: info.network.clone(),
            tx_hash,
            block_number: confirmation.block_number,
        });

        Ok(Some(tx_hash))
    }

    fn send_param(
        &self,
        destination: &dyn TokenBridge,
        recipient: Address,
        amount: &TokenAmount,
    ) -> SendParam {
        SendParam::transfer(
            destination.info().endpoint_id,
            recipient,
            amount,
            self.extra_options.clone(),
        )
    }

    async fn quote_fee(
        &self,
        source: &dyn TokenBridge,
        param: &SendParam,
    ) -> TransferResult<MessagingFee> {
        let fee = source
            .quote_send(param)
            .await
            .map_err(|e| TransferError::Quote {
                network: source.info().network.clone(),
                source: e,
            })?;

        self.observer.on_event(&TransferEvent::FeeQuoted {
            network: source.info().network.clone(),
            native_fee: fee.native_fee,
        });
        Ok(fee)
    }

    /// Balance reads never fail the run
    async fn report_balance(&self, bridge: &dyn TokenBridge, account: Address) -> Option<U256> {
        let network = bridge.info().network.clone();
        match bridge.balance_of(account).await {
            Ok(balance) => {
                self.observer.on_event(&TransferEvent::BalanceReported {
                    network,
                    account,
                    balance,
                });
                Some(balance)
            }
            Err(e) => {
                self.observer.on_event(&TransferEvent::BalanceUnavailable {
                    network,
                    account,
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

fn check_distinct(source: &dyn TokenBridge, destination: &dyn TokenBridge) -> TransferResult<()> {
    if source.info().endpoint_id == destination.info().endpoint_id {
        return Err(TransferError::Configuration(format!(
            "Source {} and destination {} share an endpoint id",
            source.info(),
            destination.info()
        )));
    }
    Ok(())
}
