//! Configuration management for the OFT transfer tool
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{TransferError, TransferResult};

/// Spender the LayerZero V2 endpoint uses on the public testnets
pub const DEFAULT_ENDPOINT_ADDRESS: &str = "0x6EDCE65403992e310A62460808c4b910D972f10f";

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub deployments: DeploymentsConfig,
    pub networks: HashMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub endpoint_address: String,
    pub token_decimals: u32,
    pub executor_gas_limit: u64,
    pub executor_native_value: u64,
    pub confirmations: u64,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            endpoint_address: DEFAULT_ENDPOINT_ADDRESS.to_string(),
            token_decimals: 18,
            executor_gas_limit: 20_000,
            executor_native_value: 0,
            confirmations: 1,
            confirmation_timeout_secs: 300,
            poll_interval_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeploymentsConfig {
    pub dir: PathBuf,
    pub contract_name: String,
}

impl Default for DeploymentsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("deployments"),
            contract_name: "SYD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub eid: u32,
    pub rpc_url: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    pub chain_id: Option<u64>,
    pub contract_address: Option<String>,
    #[serde(default)]
    pub gas_price_strategy: GasPriceStrategy,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GasPriceStrategy {
    Legacy,
    #[default]
    Eip1559,
}

impl Settings {
    /// Load settings from an explicit path, `OFT_TRANSFER_CONFIG`, or `config/default.toml`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => env::var("OFT_TRANSFER_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config/default.toml")),
        };

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references first
    pub fn from_toml(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            anyhow::bail!("At least one network must be configured");
        }

        let mut seen_eids = HashSet::new();
        for (name, network) in &self.networks {
            if network.rpc_url.trim().is_empty() {
                anyhow::bail!("Network {} has no RPC URL configured", name);
            }
            if !seen_eids.insert(network.eid) {
                anyhow::bail!("Network {} reuses endpoint id {}", name, network.eid);
            }
            if network.accounts.iter().all(|a| a.trim().is_empty()) {
                tracing::warn!("Network {} has no signing account - it cannot send", name);
            }
        }

        let transfer = &self.transfer;
        if transfer.confirmations == 0 {
            anyhow::bail!("transfer.confirmations must be at least 1");
        }
        if transfer.executor_gas_limit == 0 {
            anyhow::bail!("transfer.executor_gas_limit must be positive");
        }
        if transfer.confirmation_timeout_secs == 0 {
            anyhow::bail!("transfer.confirmation_timeout_secs must be positive");
        }
        if transfer.token_decimals > 77 {
            anyhow::bail!(
                "transfer.token_decimals {} exceeds the uint256 range",
                transfer.token_decimals
            );
        }

        Ok(())
    }

    /// Get network config by name
    pub fn network(&self, name: &str) -> TransferResult<&NetworkConfig> {
        self.networks.get(name).ok_or_else(|| {
            TransferError::Configuration(format!(
                "Network \"{}\" not found in configuration",
                name
            ))
        })
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[transfer]
confirmation_timeout_secs = 120

[networks.sepolia]
eid = 40161
rpc_url = "https://rpc.sepolia.example"
accounts = ["${OFT_TEST_KEY}"]
contract_address = "0x89d224A430cCb9bfde3F14B4A11F1C1050c915B9"

[networks.baseSepolia]
eid = 40245
rpc_url = "https://rpc.base-sepolia.example"
accounts = ["${OFT_TEST_KEY}"]
gas_price_strategy = "legacy"
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_parse_sample_with_defaults() {
        env::set_var("OFT_TEST_KEY", "0xabc");
        let settings = Settings::from_toml(SAMPLE).unwrap();

        assert_eq!(settings.transfer.confirmation_timeout_secs, 120);
        assert_eq!(settings.transfer.executor_gas_limit, 20_000);
        assert_eq!(settings.transfer.token_decimals, 18);
        assert_eq!(settings.transfer.endpoint_address, DEFAULT_ENDPOINT_ADDRESS);
        assert_eq!(settings.deployments.contract_name, "SYD");

        let sepolia = settings.network("sepolia").unwrap();
        assert_eq!(sepolia.eid, 40161);
        assert_eq!(sepolia.accounts, vec!["0xabc".to_string()]);
        assert_eq!(sepolia.gas_price_strategy, GasPriceStrategy::Eip1559);

        let base = settings.network("baseSepolia").unwrap();
        assert_eq!(base.gas_price_strategy, GasPriceStrategy::Legacy);
        assert!(base.contract_address.is_none());
    }

    #[test]
    fn test_unknown_network_is_configuration_error() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        let err = settings.network("mainnet").unwrap_err();
        assert!(matches!(err, TransferError::Configuration(_)));
        assert!(err.to_string().contains("mainnet"));
    }

    #[test]
    fn test_rejects_duplicate_endpoint_ids() {
        let input = r#"
[networks.a]
eid = 1
rpc_url = "http://a"

[networks.b]
eid = 1
rpc_url = "http://b"
"#;
        let err = Settings::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("reuses endpoint id"));
    }

    #[test]
    fn test_rejects_zero_confirmations() {
        let input = r#"
[transfer]
confirmations = 0

[networks.a]
eid = 1
rpc_url = "http://a"
"#;
        assert!(Settings::from_toml(input).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oft.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.networks.len(), 2);

        let missing = Settings::load(Some(&dir.path().join("missing.toml")));
        assert!(missing.is_err());
    }
}
