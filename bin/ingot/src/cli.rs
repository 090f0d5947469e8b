use std::collections::BTreeMap;
use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use ingot_engine::{EtherscanConfig, NetworkConfig};
use tracing::level_filters::LevelFilter;

/// Networks ingot knows out of the box. Anything else comes from `Ingot.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum NetworkPreset {
    ScrollSepolia,
}

impl NetworkPreset {
    pub fn chain_id(&self) -> u64 {
        match self {
            NetworkPreset::ScrollSepolia => 534351,
        }
    }

    pub fn rpc_url(&self) -> &'static str {
        match self {
            NetworkPreset::ScrollSepolia => "https://sepolia-rpc.scroll.io",
        }
    }

    pub fn etherscan_api_url(&self) -> &'static str {
        match self {
            NetworkPreset::ScrollSepolia => "https://api-sepolia.scrollscan.com/api",
        }
    }

    pub fn browser_url(&self) -> &'static str {
        match self {
            NetworkPreset::ScrollSepolia => "https://sepolia.scrollscan.com/",
        }
    }

    /// Materialize the preset into a network entry.
    ///
    /// The etherscan section is only present when an API key is supplied;
    /// an empty key is never silently substituted.
    pub fn to_network_config(
        &self,
        from: Option<Address>,
        api_key: Option<String>,
    ) -> NetworkConfig {
        NetworkConfig {
            url: self.rpc_url().to_string(),
            chain_id: self.chain_id(),
            accounts: from.into_iter().collect(),
            etherscan: api_key.map(|api_key| EtherscanConfig {
                api_url: self.etherscan_api_url().to_string(),
                browser_url: Some(self.browser_url().to_string()),
                api_key,
            }),
        }
    }
}

#[derive(Parser)]
#[command(name = "ingot")]
#[command(
    author,
    version,
    about = "Declarative, resumable contract deployments for EVM chains"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "INGOT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to an Ingot.toml configuration file (or a project directory).
    ///
    /// If not provided, `./Ingot.toml` is used when it exists.
    #[arg(long, alias = "conf", env = "INGOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy a module, resuming from its journal if one exists.
    Deploy {
        /// Name of the deployment module.
        module: String,

        /// Target network: a name from Ingot.toml or a built-in preset.
        #[arg(short, long, env = "INGOT_NETWORK")]
        network: String,

        /// Parameter override as `name=value`. Repeatable.
        #[arg(short, long = "parameter", value_name = "NAME=VALUE")]
        parameters: Vec<String>,

        /// Sender account, for networks not listing accounts in Ingot.toml.
        #[arg(long, env = "INGOT_FROM")]
        from: Option<Address>,

        /// Explorer API key, for preset networks.
        #[arg(long, env = "INGOT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Submit successful deployments for source verification afterwards.
        #[arg(long)]
        verify: bool,
    },

    /// Print the journal of a module on a network.
    Status {
        /// Name of the deployment module.
        module: String,

        /// Target network: a name from Ingot.toml or a built-in preset.
        #[arg(short, long, env = "INGOT_NETWORK")]
        network: String,
    },

    /// Submit already deployed contracts for source verification.
    Verify {
        /// Name of the deployment module.
        module: String,

        /// Target network: a name from Ingot.toml or a built-in preset.
        #[arg(short, long, env = "INGOT_NETWORK")]
        network: String,

        /// Parameter override as `name=value`. Must match the deployed run.
        #[arg(short, long = "parameter", value_name = "NAME=VALUE")]
        parameters: Vec<String>,

        /// Explorer API key, for preset networks.
        #[arg(long, env = "INGOT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

/// Split repeated `name=value` arguments into an override map.
pub fn parse_parameter_overrides(raw: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut overrides = BTreeMap::new();
    for entry in raw {
        let (name, value) = entry.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("invalid parameter override '{entry}', expected name=value")
        })?;
        if name.is_empty() {
            anyhow::bail!("invalid parameter override '{entry}', empty name");
        }
        overrides.insert(name.to_string(), value.to_string());
    }
    Ok(overrides)
}

/// Deployment parameters supplied through the process environment, collected
/// explicitly at the boundary so the engine never reads globals itself.
/// `INGOT_PARAM_<name>=<value>` maps to parameter `<name>`.
pub fn environment_parameters() -> BTreeMap<String, String> {
    std::env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix("INGOT_PARAM_")
                .map(|name| (name.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let overrides = parse_parameter_overrides(&[
            "_notary=0xAAA0000000000000000000000000000000000aaa".to_string(),
            "amount=10".to_string(),
        ])
        .unwrap();

        assert_eq!(
            overrides.get("_notary").map(String::as_str),
            Some("0xAAA0000000000000000000000000000000000aaa")
        );
        assert_eq!(overrides.get("amount").map(String::as_str), Some("10"));
    }

    #[test]
    fn rejects_malformed_overrides() {
        assert!(parse_parameter_overrides(&["no-equals".to_string()]).is_err());
        assert!(parse_parameter_overrides(&["=value".to_string()]).is_err());
    }

    #[test]
    fn scroll_sepolia_preset_matches_the_network() {
        let preset: NetworkPreset = "scroll-sepolia".parse().unwrap();
        assert_eq!(preset.chain_id(), 534351);

        let network = preset.to_network_config(None, None);
        assert_eq!(network.url, "https://sepolia-rpc.scroll.io");
        assert!(network.etherscan.is_none(), "no key, no etherscan section");

        let with_key = preset.to_network_config(None, Some("KEY".to_string()));
        assert_eq!(
            with_key.etherscan.unwrap().api_url,
            "https://api-sepolia.scrollscan.com/api"
        );
    }
}
