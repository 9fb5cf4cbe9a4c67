//! Deployment artifact lookup (`<dir>/<network>/<contract>.json`)

use crate::error::{TransferError, TransferResult};

use ethers::abi::Abi;
use ethers::types::Address;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// Subset of a hardhat-deploy artifact that the transfer tool reads
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentArtifact {
    pub abi: Abi,
    #[serde(default)]
    pub address: Option<Address>,
}

/// Deployment artifacts keyed by network name
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    contract_name: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, contract_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            contract_name: contract_name.into(),
        }
    }

    pub fn path_for(&self, network: &str) -> PathBuf {
        self.dir
            .join(network)
            .join(format!("{}.json", self.contract_name))
    }

    /// Load the artifact for `network`; a missing or unreadable file is an error
    pub fn load(&self, network: &str) -> TransferResult<DeploymentArtifact> {
        let path = self.path_for(network);
        let not_found = |reason: String| TransferError::ArtifactNotFound {
            network: network.to_string(),
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| not_found(e.to_string()))?;
        let artifact: DeploymentArtifact =
            serde_json::from_str(&raw).map_err(|e| not_found(format!("invalid artifact: {}", e)))?;

        debug!(
            "Loaded artifact for {} from {} ({} functions)",
            network,
            path.display(),
            artifact.abi.functions.len()
        );
        Ok(artifact)
    }
}
