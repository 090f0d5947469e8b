//! ingot-engine - Declarative deployment engine for EVM contracts.
//!
//! This crate provides the core of ingot: deployment modules declare
//! parameters and on-chain actions, the engine resolves parameters, builds a
//! dependency graph, executes it idempotently against a chain client with a
//! persisted journal, and optionally submits deployed contracts for explorer
//! source verification.

pub mod abi;
mod artifacts;
mod chain;
mod config;
mod error;
mod executor;
mod fingerprint;
mod journal;
mod module;
mod params;
mod verify;

pub use artifacts::{Artifact, ArtifactStore};
pub use chain::{CallOutcome, ChainClient, ChainError, DeployOutcome, HttpChainClient};
pub use config::{EtherscanConfig, IngotConfig, NetworkConfig, INGOT_FILENAME};
pub use error::{Error, Result};
pub use executor::{execute, ExecutionReport, FailedAction};
pub use fingerprint::DeploymentFingerprint;
pub use journal::{ActionResult, ActionStatus, Journal, JournalEntry, JournalHeader};
pub use module::{Action, ActionKind, Arg, ContractFuture, Module, ModuleBuilder, ParamHandle, ReadFuture};
pub use params::{resolve, ParamType, ParamValue, Parameter, ResolvedParameters};
pub use verify::{
    verify_deployments, EtherscanClient, ExplorerClient, SubmitResponse, VerificationRecord,
    VerificationRequest, VerificationStatus,
};
