//! Deployment configuration fingerprint.
//!
//! A journal is only resumable by the run configuration that created it.
//! The fingerprint captures everything deployment-relevant (module identity,
//! target chain, resolved parameter values); runtime-only settings such as
//! RPC endpoints or polling intervals are excluded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::module::Module;
use crate::params::ResolvedParameters;

/// Configuration parameters that identify a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFingerprint {
    pub module: String,
    pub chain_id: u64,
    pub parameters: BTreeMap<String, String>,
}

impl DeploymentFingerprint {
    pub fn new(module: &Module, chain_id: u64, params: &ResolvedParameters) -> Self {
        Self {
            module: module.name().to_string(),
            chain_id,
            parameters: params.to_display_map(),
        }
    }

    /// Hex-encoded SHA-256 over the JSON rendering. BTreeMap keys keep the
    /// serialization order stable, so the hash is deterministic.
    pub fn hash(&self) -> String {
        let json = serde_json::to_string(self)
            .expect("DeploymentFingerprint serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamType, ParamValue};

    fn fingerprint_for(notary: &str) -> DeploymentFingerprint {
        let module = Module::build("EscrowModule", |m| {
            let notary = m.param(
                "_notary",
                ParamType::Address,
                Some(ParamValue::Address(notary.parse().unwrap())),
            )?;
            m.deploy("USDT_Escrow", vec![notary.into()])?;
            Ok(())
        })
        .unwrap();
        let params = crate::params::resolve(&module, &Default::default(), &Default::default())
            .unwrap();
        DeploymentFingerprint::new(&module, 534351, &params)
    }

    #[test]
    fn hash_is_deterministic() {
        let fp = fingerprint_for("0x7cfE552f36359D1c74Bd6b89e448a6d4CcC4eca8");
        let h1 = fp.hash();
        let h2 = fp.hash();

        assert_eq!(h1, h2, "Hash should be deterministic");
        assert_eq!(h1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn hash_changes_with_parameter_values() {
        let a = fingerprint_for("0x7cfE552f36359D1c74Bd6b89e448a6d4CcC4eca8");
        let b = fingerprint_for("0xAAA0000000000000000000000000000000000aaa");

        assert_ne!(a.hash(), b.hash(), "Hash should change when a parameter changes");
    }

    #[test]
    fn hash_changes_with_chain_id() {
        let mut a = fingerprint_for("0x7cfE552f36359D1c74Bd6b89e448a6d4CcC4eca8");
        let b = a.clone();
        a.chain_id = 1;

        assert_ne!(a.hash(), b.hash(), "Hash should change when chain_id changes");
    }
}
