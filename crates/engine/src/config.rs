//! Project configuration: networks, accounts, explorer credentials.
//!
//! Loaded from `Ingot.toml`. Missing required values are validation errors;
//! the engine never substitutes silent empty defaults for them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The default name for the ingot configuration file.
pub const INGOT_FILENAME: &str = "Ingot.toml";

/// Explorer verification endpoint for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtherscanConfig {
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<String>,
    pub api_key: String,
}

/// One named target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint URL.
    pub url: String,
    pub chain_id: u64,
    /// Sender accounts available on the node or external signer.
    #[serde(default)]
    pub accounts: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etherscan: Option<EtherscanConfig>,
}

impl NetworkConfig {
    /// The account transactions are sent from (the first configured one).
    pub fn sender(&self) -> Result<Address> {
        self.accounts.first().copied().ok_or_else(|| Error::InvalidConfig {
            reason: "network has no accounts configured".to_string(),
        })
    }
}

/// Root configuration for a deployment project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngotConfig {
    /// Where journals are written.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Where compiled contract artifacts are read from.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("deployments")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Default for IngotConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            artifacts_dir: default_artifacts_dir(),
            networks: BTreeMap::new(),
        }
    }
}

impl IngotConfig {
    /// Load the configuration from a TOML file (or a directory containing
    /// `Ingot.toml`) and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InvalidConfig {
                reason: format!("configuration file or directory not found: {}", path.display()),
            });
        }

        let config_path = if path.is_dir() {
            path.join(INGOT_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path).map_err(|e| Error::InvalidConfig {
            reason: format!("failed to read {}: {e}", config_path.display()),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::InvalidConfig {
            reason: format!("failed to parse {} as TOML: {e}", config_path.display()),
        })?;

        config.validate()?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig {
            reason: format!("failed to serialize configuration: {e}"),
        })?;
        std::fs::write(path, content).map_err(|e| Error::InvalidConfig {
            reason: format!("failed to write {}: {e}", path.display()),
        })?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Look up a network entry by name.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).ok_or_else(|| Error::InvalidConfig {
            reason: format!(
                "unknown network '{}' (configured: {})",
                name,
                if self.networks.is_empty() {
                    "none".to_string()
                } else {
                    self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
                }
            ),
        })
    }

    /// Journal location for a module on a network.
    pub fn journal_path(&self, module: &str, chain_id: u64) -> PathBuf {
        self.data_dir.join(format!("{module}-{chain_id}.journal.jsonl"))
    }

    /// Validate every network entry. Empty URLs, zero chain ids and empty
    /// explorer keys are configuration bugs, surfaced here rather than at
    /// submission time.
    pub fn validate(&self) -> Result<()> {
        for (name, network) in &self.networks {
            if network.url.is_empty() {
                return Err(Error::InvalidConfig {
                    reason: format!("network '{name}' has an empty RPC url"),
                });
            }
            url::Url::parse(&network.url).map_err(|e| Error::InvalidConfig {
                reason: format!("network '{name}' has an invalid RPC url: {e}"),
            })?;
            if network.chain_id == 0 {
                return Err(Error::InvalidConfig {
                    reason: format!("network '{name}' has chain_id 0"),
                });
            }

            if let Some(etherscan) = &network.etherscan {
                url::Url::parse(&etherscan.api_url).map_err(|e| Error::InvalidConfig {
                    reason: format!("network '{name}' has an invalid explorer API url: {e}"),
                })?;
                if etherscan.api_key.is_empty() {
                    return Err(Error::InvalidConfig {
                        reason: format!(
                            "network '{name}' has an etherscan section with an empty api_key"
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn scroll_sepolia() -> NetworkConfig {
        NetworkConfig {
            url: "https://sepolia-rpc.scroll.io".to_string(),
            chain_id: 534351,
            accounts: vec!["0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()],
            etherscan: Some(EtherscanConfig {
                api_url: "https://api-sepolia.scrollscan.com/api".to_string(),
                browser_url: Some("https://sepolia.scrollscan.com/".to_string()),
                api_key: "KEY".to_string(),
            }),
        }
    }

    #[test]
    fn toml_roundtrip() {
        let tmp = TempDir::new("ingot-config").unwrap();
        let path = tmp.path().join(INGOT_FILENAME);

        let mut config = IngotConfig::default();
        config.networks.insert("scroll-sepolia".to_string(), scroll_sepolia());
        config.save_to_file(&path).unwrap();

        let loaded = IngotConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_accepts_a_project_directory() {
        let tmp = TempDir::new("ingot-config").unwrap();
        let mut config = IngotConfig::default();
        config.networks.insert("scroll-sepolia".to_string(), scroll_sepolia());
        config.save_to_file(&tmp.path().join(INGOT_FILENAME)).unwrap();

        let loaded = IngotConfig::load_from_file(tmp.path()).unwrap();
        assert_eq!(loaded.networks.len(), 1);
    }

    #[test]
    fn empty_url_fails_validation() {
        let mut network = scroll_sepolia();
        network.url = String::new();
        let mut config = IngotConfig::default();
        config.networks.insert("bad".to_string(), network);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { reason } if reason.contains("empty RPC url")));
    }

    #[test]
    fn empty_api_key_fails_validation() {
        let mut network = scroll_sepolia();
        network.etherscan.as_mut().unwrap().api_key = String::new();
        let mut config = IngotConfig::default();
        config.networks.insert("bad".to_string(), network);

        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_network_lists_configured_ones() {
        let mut config = IngotConfig::default();
        config.networks.insert("scroll-sepolia".to_string(), scroll_sepolia());

        let err = config.network("mainnet").unwrap_err();
        assert!(
            matches!(err, Error::InvalidConfig { reason } if reason.contains("scroll-sepolia"))
        );
    }

    #[test]
    fn sender_is_first_account() {
        let network = scroll_sepolia();
        assert_eq!(network.sender().unwrap(), network.accounts[0]);

        let mut empty = scroll_sepolia();
        empty.accounts.clear();
        assert!(empty.sender().is_err());
    }

    #[test]
    fn journal_path_includes_module_and_chain() {
        let config = IngotConfig::default();
        assert_eq!(
            config.journal_path("EscrowModule", 534351),
            PathBuf::from("deployments/EscrowModule-534351.journal.jsonl")
        );
    }
}
