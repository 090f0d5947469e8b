//! Error taxonomy for the deployment engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of a deployment run.
///
/// Build-time and resolution-time errors abort a run before any chain action
/// is attempted. Execution-time errors are journaled per-action and the run
/// can be resumed with the same journal. Verification errors never affect
/// deployment success.
#[derive(Debug, Error)]
pub enum Error {
    // --- resolution-time ---
    #[error("parameter '{name}' has no override, no environment entry and no default")]
    UnresolvedParameter { name: String },

    #[error("parameter '{name}' expected a {expected} value, got '{got}'")]
    InvalidParameterType {
        name: String,
        expected: &'static str,
        got: String,
    },

    // --- build-time ---
    #[error("module name must be non-empty and alphanumeric, got '{0}'")]
    InvalidModuleName(String),

    #[error("parameter '{name}' declared twice in the same module")]
    DuplicateParameter { name: String },

    #[error("action '{action_id}' references a future from outside this module")]
    UndeclaredFutureReference { action_id: String },

    #[error("action '{action_id}' would close a dependency cycle")]
    CyclicDependency { action_id: String },

    // --- execution-time (journaled, resumable) ---
    #[error("action '{action_id}' reverted: {reason}")]
    TransactionReverted { action_id: String, reason: String },

    #[error("action '{action_id}' timed out awaiting confirmation")]
    TransactionTimeout { action_id: String },

    #[error("RPC error: {0}")]
    RpcConnection(String),

    // --- journal ---
    #[error("journal at {path} is locked by another deployment run")]
    JournalLocked { path: PathBuf },

    #[error("journal at {path} is corrupt at line {line}: {reason}")]
    JournalCorrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error(
        "journal was written by a different deployment configuration \
         (expected fingerprint {expected}, found {found})"
    )]
    JournalMismatch { expected: String, found: String },

    #[error("journal I/O error at {path}: {source}")]
    JournalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // --- configuration ---
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("no artifact found for contract '{contract}'")]
    MissingArtifact { contract: String },

    #[error("artifact for contract '{contract}' is malformed: {reason}")]
    MalformedArtifact { contract: String, reason: String },

    // --- verification (non-fatal) ---
    #[error("verification submission failed: {reason}")]
    VerificationSubmission { reason: String },
}

impl Error {
    /// Whether re-running with the same journal can make progress.
    ///
    /// Only per-action execution failures are resumable; everything else
    /// requires corrected input (module definition, parameters, config).
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            Error::TransactionReverted { .. }
                | Error::TransactionTimeout { .. }
                | Error::RpcConnection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_errors_are_resumable() {
        assert!(
            Error::TransactionReverted {
                action_id: "m#0:deploy:X".into(),
                reason: "out of gas".into()
            }
            .is_resumable()
        );
        assert!(Error::RpcConnection("connection refused".into()).is_resumable());
    }

    #[test]
    fn definition_errors_are_fatal() {
        assert!(!Error::UnresolvedParameter { name: "_usdt".into() }.is_resumable());
        assert!(
            !Error::CyclicDependency {
                action_id: "m#1:call:transfer".into()
            }
            .is_resumable()
        );
        assert!(
            !Error::InvalidConfig {
                reason: "missing url".into()
            }
            .is_resumable()
        );
    }
}
