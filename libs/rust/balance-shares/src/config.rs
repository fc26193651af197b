use alloy::{
    primitives::{Address, U256},
    sol_types::Eip712Domain,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, env, fs, path::Path};
use tracing::{info, warn};
use utils::errors::{
    BALANCE_SHARES_CHAIN_ID_ENV, BALANCE_SHARES_CONFIG_PATH_ENV, BALANCE_SHARES_DOMAIN_NAME_ENV,
    BALANCE_SHARES_DOMAIN_VERSION_ENV, BALANCE_SHARES_VERIFYING_CONTRACT_ENV, CONFIG_PARSE_FAILED,
    CONFIG_READ_FAILED,
};

const DEFAULT_CONFIG_PATH: &str = "balance-shares.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BalanceSharesConfig {
    pub domain: DomainConfig,
}

/// EIP-712 domain signed withdrawals are bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: "BalanceShares".to_string(),
            version: "1".to_string(),
            chain_id: 1,
            verifying_contract: Address::ZERO,
        }
    }
}

impl BalanceSharesConfig {
    pub fn eip712_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Owned(self.domain.name.clone())),
            Some(Cow::Owned(self.domain.version.clone())),
            Some(U256::from(self.domain.chain_id)),
            Some(self.domain.verifying_contract),
            None,
        )
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context(CONFIG_PARSE_FAILED)
    }

    /// Strict load: a missing or malformed file is an error.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context(CONFIG_READ_FAILED)?;
        Self::from_yaml_str(&contents)
    }
}

/// Loads `BALANCE_SHARES_CONFIG_PATH` (default `balance-shares.yaml`), falling back to
/// defaults, then applies `BALANCE_SHARES_*` environment overrides.
pub fn load_config() -> BalanceSharesConfig {
    dotenv::dotenv().ok();

    let path = env::var(BALANCE_SHARES_CONFIG_PATH_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = match BalanceSharesConfig::from_path(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %format!("{err:#}"), path = %path, "Balance shares config unavailable, using defaults");
            BalanceSharesConfig::default()
        }
    };

    apply_overrides(&mut config, |key| env::var(key).ok());

    info!(
        domain_name = %config.domain.name,
        domain_version = %config.domain.version,
        chain_id = config.domain.chain_id,
        verifying_contract = %config.domain.verifying_contract,
        "Balance shares config loaded"
    );

    config
}

fn apply_overrides(config: &mut BalanceSharesConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(value) = lookup(BALANCE_SHARES_DOMAIN_NAME_ENV) {
        config.domain.name = value;
    }

    if let Some(value) = lookup(BALANCE_SHARES_DOMAIN_VERSION_ENV) {
        config.domain.version = value;
    }

    if let Some(value) = lookup(BALANCE_SHARES_CHAIN_ID_ENV) {
        match value.parse::<u64>() {
            Ok(chain_id) => config.domain.chain_id = chain_id,
            Err(err) => {
                warn!(error = %err, "Failed to parse {} override", BALANCE_SHARES_CHAIN_ID_ENV);
            }
        }
    }

    if let Some(value) = lookup(BALANCE_SHARES_VERIFYING_CONTRACT_ENV) {
        match value.parse::<Address>() {
            Ok(address) => config.domain.verifying_contract = address,
            Err(err) => {
                warn!(
                    error = %err,
                    "Failed to parse {} override", BALANCE_SHARES_VERIFYING_CONTRACT_ENV
                );
            }
        }
    }
}
