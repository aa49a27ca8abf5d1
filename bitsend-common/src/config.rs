//! Configuration management for BitSend.
//!
//! Settings are stored in TOML. Every field has a default, so an empty file
//! (or no file at all) yields a working testnet configuration.
//!
//! [`NetworkParams`] is the immutable per-run view derived from the
//! configuration once the operator has picked a network. Components receive
//! it by reference; nothing reads network settings from global state.

use anyhow::{anyhow, Result};
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::PaymentError;
use crate::logging::LogConfig;
use crate::types::{FeeRate, DUST_THRESHOLD};

/// Main configuration structure for BitSend
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Explorer and network selection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Default network offered at the network prompt ("bitcoin" or "testnet")
    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_mainnet_explorer")]
    pub mainnet_explorer_url: String,

    #[serde(default = "default_testnet_explorer")]
    pub testnet_explorer_url: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            mainnet_explorer_url: default_mainnet_explorer(),
            testnet_explorer_url: default_testnet_explorer(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Fee estimation and coin selection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeConfig {
    /// Confirmation target looked up in the explorer's fee estimates
    #[serde(default = "default_confirmation_target")]
    pub confirmation_target: u32,

    /// Rate used when the explorer has no estimate for the target (sat/vB)
    #[serde(default = "default_fallback_fee_rate")]
    pub fallback_fee_rate: u64,

    /// Extra value the coin selector gathers above amount plus fee (sats)
    #[serde(default = "default_selection_margin")]
    pub selection_margin: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            confirmation_target: default_confirmation_target(),
            fallback_fee_rate: default_fallback_fee_rate(),
            selection_margin: default_selection_margin(),
        }
    }
}

impl FeeConfig {
    pub fn fallback_rate(&self) -> FeeRate {
        FeeRate::from_sat_per_vb(self.fallback_fee_rate)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path, content).map_err(|e| anyhow!("Failed to write config file: {}", e))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        parse_network(&self.network.network)
            .map_err(|_| anyhow!("Invalid network type: {}", self.network.network))?;

        if self.network.timeout_seconds == 0 {
            return Err(anyhow!("Invalid network timeout: must be greater than 0"));
        }

        for url in [
            &self.network.mainnet_explorer_url,
            &self.network.testnet_explorer_url,
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("Invalid explorer URL: {}", url));
            }
        }

        if self.fees.confirmation_target == 0 {
            return Err(anyhow!("Invalid confirmation target: must be greater than 0"));
        }

        if self.fees.fallback_fee_rate == 0 {
            return Err(anyhow!("Invalid fallback fee rate: must be greater than 0"));
        }

        Ok(())
    }

    /// The network named in the configuration file
    pub fn default_network(&self) -> Result<Network, PaymentError> {
        parse_network(&self.network.network)
    }
}

/// Ensure a configuration file exists at the specified path
/// If it doesn't exist, create it with default values
pub fn ensure_config_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;
            }
        }

        Config::default().save(path)?;
    }

    Ok(())
}

/// Parse an operator-facing network name
///
/// Only mainnet and testnet are supported.
pub fn parse_network(name: &str) -> Result<Network, PaymentError> {
    match name.trim().to_lowercase().as_str() {
        "bitcoin" | "mainnet" | "main" => Ok(Network::Bitcoin),
        "testnet" | "test" => Ok(Network::Testnet),
        other => Err(PaymentError::Config(format!("Unsupported network: {}", other))),
    }
}

/// Parameters of the network chosen for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    pub dust_threshold: u64,
    /// Explorer API base, without a trailing slash
    pub explorer_url: String,
    pub request_timeout: Duration,
}

impl NetworkParams {
    pub fn from_config(config: &Config, network: Network) -> Result<Self, PaymentError> {
        let explorer_url = match network {
            Network::Bitcoin => &config.network.mainnet_explorer_url,
            Network::Testnet => &config.network.testnet_explorer_url,
            other => {
                return Err(PaymentError::Config(format!(
                    "Unsupported network: {:?}",
                    other
                )))
            }
        };

        Ok(Self::with_explorer(
            network,
            explorer_url,
            config.network.timeout_seconds,
        ))
    }

    fn with_explorer(network: Network, explorer_url: &str, timeout_seconds: u32) -> Self {
        Self {
            network,
            dust_threshold: DUST_THRESHOLD,
            explorer_url: explorer_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(u64::from(timeout_seconds)),
        }
    }

    /// Mainnet with the default explorer
    pub fn mainnet() -> Self {
        Self::with_explorer(Network::Bitcoin, &default_mainnet_explorer(), default_timeout())
    }

    /// Testnet with the default explorer
    pub fn testnet() -> Self {
        Self::with_explorer(Network::Testnet, &default_testnet_explorer(), default_timeout())
    }

    pub fn is_mainnet(&self) -> bool {
        self.network == Network::Bitcoin
    }

    /// Human-facing link for a transaction, derived from the API base
    pub fn explorer_tx_url(&self, txid: &str) -> String {
        let web_base = self
            .explorer_url
            .strip_suffix("/api")
            .unwrap_or(&self.explorer_url);
        format!("{}/tx/{}", web_base, txid)
    }
}

// Default value functions

fn default_network() -> String {
    "testnet".to_string()
}

fn default_mainnet_explorer() -> String {
    "https://blockstream.info/api".to_string()
}

fn default_testnet_explorer() -> String {
    "https://blockstream.info/testnet/api".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_confirmation_target() -> u32 {
    6
}

fn default_fallback_fee_rate() -> u64 {
    2
}

fn default_selection_margin() -> u64 {
    1000
}
