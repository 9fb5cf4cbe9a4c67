//! Builds `ChainContext` values from static configuration and deployment artifacts.
//! Only local reads happen here; no RPC calls.

use super::{ArtifactStore, ChainContext, DeploymentArtifact, SigningKey};
use crate::config::{NetworkConfig, Settings};
use crate::error::{TransferError, TransferResult};

use ethers::types::Address;
use std::str::FromStr;
use tracing::debug;

pub struct ChainResolver<'a> {
    settings: &'a Settings,
    artifacts: ArtifactStore,
}

impl<'a> ChainResolver<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        let artifacts = ArtifactStore::new(
            settings.deployments.dir.clone(),
            settings.deployments.contract_name.clone(),
        );
        Self {
            settings,
            artifacts,
        }
    }

    pub fn with_artifacts(settings: &'a Settings, artifacts: ArtifactStore) -> Self {
        Self {
            settings,
            artifacts,
        }
    }

    /// Resolve `network` with an explicit contract address
    pub fn resolve(
        &self,
        network: &str,
        contract_address: Address,
    ) -> TransferResult<ChainContext> {
        let config = self.settings.network(network)?;
        let artifact = self.artifacts.load(network)?;
        build_context(network, config, artifact, contract_address)
    }

    /// Resolve `network`, picking the contract address from the override,
    /// the network config, or the deployment artifact, in that order
    pub fn resolve_with_default(
        &self,
        network: &str,
        override_address: Option<Address>,
    ) -> TransferResult<ChainContext> {
        let config = self.settings.network(network)?;
        let artifact = self.artifacts.load(network)?;

        let address = match (override_address, config.contract_address.as_deref()) {
            (Some(address), _) => Some(address),
            (None, Some(configured)) => Some(parse_address(network, configured)?),
            (None, None) => artifact.address,
        };

        match address {
            Some(address) => build_context(network, config, artifact, address),
            None => Err(TransferError::Configuration(format!(
                "No contract address for network \"{}\": pass one explicitly, \
                 set networks.{}.contract_address, or deploy an artifact with an address",
                network, network
            ))),
        }
    }
}

fn build_context(
    network: &str,
    config: &NetworkConfig,
    artifact: DeploymentArtifact,
    contract_address: Address,
) -> TransferResult<ChainContext> {
    let signing_key = first_account(network, &config.accounts)?;

    debug!(
        "Resolved {} (eid {}) contract {:?}",
        network, config.eid, contract_address
    );

    Ok(ChainContext {
        network: network.to_string(),
        endpoint_id: config.eid,
        chain_id: config.chain_id,
        rpc_url: config.rpc_url.clone(),
        signing_key,
        contract_address,
        abi: artifact.abi,
        gas_price_strategy: config.gas_price_strategy,
    })
}

pub fn parse_address(network: &str, value: &str) -> TransferResult<Address> {
    Address::from_str(value.trim()).map_err(|e| {
        TransferError::Configuration(format!(
            "Invalid contract address {:?} for network {}: {}",
            value, network, e
        ))
    })
}

fn first_account(network: &str, accounts: &[String]) -> TransferResult<SigningKey> {
    accounts
        .iter()
        .map(|a| a.trim())
        .find(|a| !a.is_empty())
        .map(SigningKey::new)
        .ok_or_else(|| {
            TransferError::Configuration(format!(
                "Network \"{}\" has no signing account configured",
                network
            ))
        })
}
