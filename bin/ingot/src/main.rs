//! ingot is a CLI for declarative, resumable EVM contract deployments.

mod cli;
mod modules;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use ingot_engine::{
    execute, resolve, ActionResult, ArtifactStore, ChainClient, DeploymentFingerprint,
    EtherscanClient, ExecutionReport, HttpChainClient, IngotConfig, Journal, JournalHeader,
    Module, NetworkConfig, ResolvedParameters, VerificationStatus, INGOT_FILENAME,
};

use cli::{Cli, Command, NetworkPreset};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Deploy {
            module,
            network,
            parameters,
            from,
            api_key,
            verify,
        } => {
            let network = resolve_network(&config, &network, from, api_key)?;
            let module = modules::build(&module)?;
            let overrides = cli::parse_parameter_overrides(&parameters)?;
            let params = resolve(&module, &overrides, &cli::environment_parameters())?;

            deploy(&config, &network, &module, &params, verify).await
        }
        Command::Status { module, network } => {
            let network = resolve_network(&config, &network, None, None)?;
            let module = modules::build(&module)?;
            status(&config, &network, &module)
        }
        Command::Verify {
            module,
            network,
            parameters,
            api_key,
        } => {
            let network = resolve_network(&config, &network, None, api_key)?;
            let module = modules::build(&module)?;
            let overrides = cli::parse_parameter_overrides(&parameters)?;
            let params = resolve(&module, &overrides, &cli::environment_parameters())?;

            verify_journal(&config, &network, &module, &params).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load `Ingot.toml` (explicit path, or the working directory's file if it
/// exists), with `INGOT_CFG_*` environment overrides layered on top.
fn load_config(path: &Option<PathBuf>) -> Result<IngotConfig> {
    let file = match path {
        Some(p) => {
            let file = if p.is_dir() { p.join(INGOT_FILENAME) } else { p.clone() };
            if !file.exists() {
                anyhow::bail!("configuration file not found: {}", file.display());
            }
            Some(file)
        }
        None => {
            let default = PathBuf::from(INGOT_FILENAME);
            default.exists().then_some(default)
        }
    };

    let mut figment = Figment::new();
    if let Some(file) = &file {
        figment = figment.merge(Toml::file(file));
    }
    let config: IngotConfig = figment
        .merge(Env::prefixed("INGOT_CFG_").split("__"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;
    if let Some(file) = &file {
        tracing::debug!(path = %file.display(), "Configuration loaded");
    }
    Ok(config)
}

/// A network is either an entry in `Ingot.toml` or a built-in preset.
fn resolve_network(
    config: &IngotConfig,
    name: &str,
    from: Option<alloy_core::primitives::Address>,
    api_key: Option<String>,
) -> Result<NetworkConfig> {
    if let Ok(network) = config.network(name) {
        let mut network = network.clone();
        if network.accounts.is_empty() {
            network.accounts.extend(from);
        }
        return Ok(network);
    }

    if let Ok(preset) = name.parse::<NetworkPreset>() {
        tracing::debug!(network = %preset, "Using built-in network preset");
        return Ok(preset.to_network_config(from, api_key));
    }

    // Surface the config lookup error: it lists the configured networks.
    Err(config.network(name).unwrap_err().into())
}

fn open_journal(
    config: &IngotConfig,
    network: &NetworkConfig,
    module: &Module,
    params: &ResolvedParameters,
) -> Result<Journal> {
    let fingerprint = DeploymentFingerprint::new(module, network.chain_id, params).hash();
    let journal = Journal::open(
        config.journal_path(module.name(), network.chain_id),
        JournalHeader {
            module: module.name().to_string(),
            chain_id: network.chain_id,
            fingerprint,
        },
    )?;
    Ok(journal)
}

async fn deploy(
    config: &IngotConfig,
    network: &NetworkConfig,
    module: &Module,
    params: &ResolvedParameters,
    verify: bool,
) -> Result<ExitCode> {
    let artifacts = ArtifactStore::new(&config.artifacts_dir);
    let client = HttpChainClient::new(&network.url, network.sender()?)?;

    // Refuse to submit against the wrong chain.
    let remote_chain_id = client
        .chain_id()
        .await
        .map_err(|e| anyhow::anyhow!("failed to query chain id from {}: {e}", network.url))?;
    if remote_chain_id != network.chain_id {
        anyhow::bail!(
            "network mismatch: {} reports chain id {remote_chain_id}, configuration says {}",
            network.url,
            network.chain_id
        );
    }

    let mut journal = open_journal(config, network, module, params)?;

    tracing::info!(
        module = %module.name(),
        chain_id = network.chain_id,
        actions = module.actions().len(),
        "Starting deployment"
    );
    let report = execute(module, params, &artifacts, &client, &mut journal).await?;
    print_report(&report);

    if let Some(failed) = &report.failed {
        tracing::error!(
            action = %failed.action_id,
            error = %failed.error,
            "Deployment halted; re-run the same command to resume"
        );
        return Ok(ExitCode::from(2));
    }

    if verify {
        match &network.etherscan {
            Some(_) => {
                verify_with_journal(config, network, module, params, &journal).await?;
            }
            None => {
                tracing::warn!("No etherscan configuration for this network, skipping verification")
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &ExecutionReport) {
    tracing::info!(
        executed = report.succeeded.len(),
        reused = report.reused.len(),
        unattempted = report.unattempted.len(),
        "Run summary"
    );
    for id in &report.succeeded {
        tracing::info!(action = %id, "  executed");
    }
    for id in &report.reused {
        tracing::info!(action = %id, "  reused from journal");
    }
    for id in &report.unattempted {
        tracing::warn!(action = %id, "  not attempted");
    }
}

/// `ingot verify`: submit from an existing journal.
async fn verify_journal(
    config: &IngotConfig,
    network: &NetworkConfig,
    module: &Module,
    params: &ResolvedParameters,
) -> Result<()> {
    let journal = open_journal(config, network, module, params)?;
    verify_with_journal(config, network, module, params, &journal).await
}

async fn verify_with_journal(
    config: &IngotConfig,
    network: &NetworkConfig,
    module: &Module,
    params: &ResolvedParameters,
    journal: &Journal,
) -> Result<()> {
    let etherscan = network.etherscan.as_ref().ok_or_else(|| {
        anyhow::anyhow!("network has no etherscan configuration; add one or pass --api-key")
    })?;
    let explorer = EtherscanClient::new(&etherscan.api_url, &etherscan.api_key)?;
    let artifacts = ArtifactStore::new(&config.artifacts_dir);

    let records = ingot_engine::verify_deployments(module, params, &artifacts, journal, &explorer)
        .await?;

    if records.is_empty() {
        tracing::info!("Nothing to verify: no successful deployments in the journal");
        return Ok(());
    }

    for record in &records {
        match record.status {
            VerificationStatus::Verified => {
                let link = etherscan
                    .browser_url
                    .as_ref()
                    .map(|base| format!(" ({}address/{})", base, record.address))
                    .unwrap_or_default();
                tracing::info!(contract = %record.contract, address = %record.address, "Verified{link}");
            }
            status => {
                tracing::warn!(
                    contract = %record.contract,
                    address = %record.address,
                    status = %status,
                    detail = record.detail.as_deref().unwrap_or("-"),
                    "Verification did not complete"
                );
            }
        }
    }
    Ok(())
}

/// `ingot status`: render the journal as a table.
fn status(config: &IngotConfig, network: &NetworkConfig, module: &Module) -> Result<ExitCode> {
    let path = config.journal_path(module.name(), network.chain_id);
    if !path.exists() {
        tracing::info!(
            module = %module.name(),
            chain_id = network.chain_id,
            "No journal found; nothing deployed yet"
        );
        return Ok(ExitCode::SUCCESS);
    }

    let (header, entries) = Journal::read(&path)?;

    let mut table = Table::new();
    table.set_header(["Action", "Status", "Result", "Tx hash", "Timestamp"]);

    let mut rows: Vec<_> = entries.values().collect();
    rows.sort_by_key(|entry| entry.timestamp);
    for entry in rows {
        let result = match &entry.result {
            Some(ActionResult::Address(addr)) => addr.to_string(),
            Some(ActionResult::Data(bytes)) => format!("0x{}", hex::encode(bytes)),
            None => entry.error.clone().unwrap_or_else(|| "-".to_string()),
        };
        table.add_row([
            entry.action_id.clone(),
            format!("{:?}", entry.status),
            result,
            entry
                .tx_hash
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string()),
            entry.timestamp.to_rfc3339(),
        ]);
    }

    println!("Module {} on chain {}", header.module, header.chain_id);
    println!("{table}");
    Ok(ExitCode::SUCCESS)
}
