//! Compiled contract artifacts.
//!
//! The engine does not compile contracts; it reads the compiler's output
//! from an artifacts directory, one `<Contract>.json` per contract.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::module::{Action, Module};

/// Compiler output for a single contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    /// Creation bytecode, constructor arguments not included.
    pub bytecode: Bytes,
    pub compiler_version: String,
    /// Solidity source path, e.g. `contracts/Escrow.sol`.
    pub source_name: String,
    /// Flattened source code, required for explorer verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Loads artifacts from a directory on demand.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the artifact for a contract by name.
    pub fn load(&self, contract: &str) -> Result<Artifact> {
        let path = self.dir.join(format!("{contract}.json"));
        if !path.exists() {
            return Err(Error::MissingArtifact {
                contract: contract.to_string(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::MalformedArtifact {
            contract: contract.to_string(),
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let artifact: Artifact =
            serde_json::from_str(&content).map_err(|e| Error::MalformedArtifact {
                contract: contract.to_string(),
                reason: e.to_string(),
            })?;

        if artifact.bytecode.is_empty() {
            return Err(Error::MalformedArtifact {
                contract: contract.to_string(),
                reason: "empty creation bytecode".to_string(),
            });
        }

        Ok(artifact)
    }

    /// Verify every deployable contract in a module has an artifact.
    ///
    /// Runs before execution so a missing artifact can never leave partial
    /// on-chain state behind.
    pub fn ensure_all(&self, module: &Module) -> Result<()> {
        for action in module.actions() {
            if let Action::Deploy { contract, .. } = action {
                self.load(contract)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write_artifact(dir: &Path, name: &str, bytecode: &str) {
        let artifact = serde_json::json!({
            "contractName": name,
            "bytecode": bytecode,
            "compilerVersion": "v0.8.26+commit.8a97fa7a",
            "sourceName": format!("contracts/{name}.sol"),
        });
        std::fs::write(
            dir.join(format!("{name}.json")),
            serde_json::to_string_pretty(&artifact).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn loads_artifact_by_contract_name() {
        let tmp = TempDir::new("ingot-artifacts").unwrap();
        write_artifact(tmp.path(), "USDT_Escrow", "0x6080604052");

        let store = ArtifactStore::new(tmp.path());
        let artifact = store.load("USDT_Escrow").unwrap();

        assert_eq!(artifact.contract_name, "USDT_Escrow");
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(artifact.source_name, "contracts/USDT_Escrow.sol");
        assert!(artifact.source.is_none());
    }

    #[test]
    fn missing_artifact_is_reported_by_name() {
        let tmp = TempDir::new("ingot-artifacts").unwrap();
        let store = ArtifactStore::new(tmp.path());

        let err = store.load("Ghost").unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { contract } if contract == "Ghost"));
    }

    #[test]
    fn empty_bytecode_is_malformed() {
        let tmp = TempDir::new("ingot-artifacts").unwrap();
        write_artifact(tmp.path(), "Empty", "0x");

        let store = ArtifactStore::new(tmp.path());
        let err = store.load("Empty").unwrap_err();
        assert!(matches!(err, Error::MalformedArtifact { .. }));
    }

    #[test]
    fn ensure_all_checks_every_deploy() {
        let tmp = TempDir::new("ingot-artifacts").unwrap();
        write_artifact(tmp.path(), "Token", "0x60806040");

        let module = Module::build("TwoDeploys", |m| {
            let token = m.deploy("Token", vec![])?;
            m.deploy("Vault", vec![token.into()])?;
            Ok(())
        })
        .unwrap();

        let store = ArtifactStore::new(tmp.path());
        let err = store.ensure_all(&module).unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { contract } if contract == "Vault"));
    }
}
