//! TOML configuration for deployments.
//!
//! A deploy config carries the rewards constructor parameters and the reward
//! token to create when none exists yet. Missing fields fall back to the
//! weekly defaults; CLI flags override whatever the file says.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::contracts::rewards::RewardsInit;
use crate::contracts::token::TokenInit;
use crate::tokenomics::RewardParams;
use crate::types::{Address, TokenAmount};

/// One week in seconds
pub const WEEK_SECS: u64 = 86_400 * 7;

/// Default data directory: `~/.epoch-rewards`
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".epoch-rewards")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error (config file loading)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML could not be parsed or written
    #[error("parse error: {0}")]
    ParseError(String),
    /// A value is out of range or malformed
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// TOML-serializable deploy config
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Reward per epoch in tokens, decimal string (default: "10000")
    #[serde(default = "default_reward_per_epoch")]
    pub reward_per_epoch: String,
    /// Epoch length in seconds (default: one week)
    #[serde(default = "default_duration")]
    pub epoch_duration: u64,
    /// Release window in seconds (default: one week)
    #[serde(default = "default_duration")]
    pub reward_duration: u64,
    /// Lending contract address (hex); the deployer when absent
    pub lending_contract: Option<String>,
    /// Reward token settings
    #[serde(default)]
    pub token: TokenConfig,
}

/// Reward token created by `deploy-token`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token name (default: "Reward Token")
    #[serde(default = "default_token_name")]
    pub name: String,
    /// Ticker (default: "RWD")
    #[serde(default = "default_token_symbol")]
    pub symbol: String,
    /// Supply minted to the deployer, decimal string (default: "1000000")
    #[serde(default = "default_initial_supply")]
    pub initial_supply: String,
}

fn default_reward_per_epoch() -> String {
    "10000".to_string()
}

fn default_duration() -> u64 {
    WEEK_SECS
}

fn default_token_name() -> String {
    "Reward Token".to_string()
}

fn default_token_symbol() -> String {
    "RWD".to_string()
}

fn default_initial_supply() -> String {
    "1000000".to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: default_token_name(),
            symbol: default_token_symbol(),
            initial_supply: default_initial_supply(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        default_toml()
    }
}

fn parse_amount(field: &str, value: &str) -> Result<TokenAmount, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::InvalidConfig(format!("{field}: {e}")))
}

impl DeployConfig {
    /// Load from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validated epoch parameters
    pub fn params(&self) -> Result<RewardParams, ConfigError> {
        RewardParams::new(
            parse_amount("reward_per_epoch", &self.reward_per_epoch)?,
            self.epoch_duration,
            self.reward_duration,
        )
        .map_err(|e| ConfigError::InvalidConfig(e.to_string()))
    }

    /// Lending contract, falling back to `deployer`
    pub fn lending_contract_or(&self, deployer: Address) -> Result<Address, ConfigError> {
        self.lending_contract.as_deref().map_or(Ok(deployer), |s| {
            s.parse()
                .map_err(|e| ConfigError::InvalidConfig(format!("lending_contract: {e}")))
        })
    }

    /// Constructor arguments for the rewards contract
    pub fn rewards_init(
        &self,
        deployer: Address,
        reward_token: Address,
    ) -> Result<RewardsInit, ConfigError> {
        let params = self.params()?;
        Ok(RewardsInit {
            reward_per_epoch: params.reward_per_epoch,
            epoch_duration: params.epoch_duration,
            reward_duration: params.reward_duration,
            lending_contract: self.lending_contract_or(deployer)?,
            reward_token,
        })
    }

    /// Constructor arguments for the reward token
    pub fn token_init(&self) -> Result<TokenInit, ConfigError> {
        Ok(TokenInit {
            name: self.token.name.clone(),
            symbol: self.token.symbol.clone(),
            initial_supply: parse_amount("token.initial_supply", &self.token.initial_supply)?,
        })
    }
}

/// Default config: 10000 tokens per week-long epoch
#[must_use]
pub fn default_toml() -> DeployConfig {
    DeployConfig {
        reward_per_epoch: default_reward_per_epoch(),
        epoch_duration: WEEK_SECS,
        reward_duration: WEEK_SECS,
        lending_contract: None,
        token: TokenConfig::default(),
    }
}
