//! Graph execution engine.
//!
//! Walks a module's actions in topological order (declaration order), skips
//! actions already journaled as successful, and persists every outcome
//! before moving on. A per-action failure halts the traversal and leaves a
//! resumable journal behind.

use crate::abi::{self, AbiValue};
use crate::artifacts::ArtifactStore;
use crate::chain::{ChainClient, ChainError};
use crate::error::{Error, Result};
use crate::journal::{ActionResult, Journal};
use crate::module::{Action, Arg, Module};
use crate::params::{ParamValue, ResolvedParameters};

/// The first failure of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAction {
    pub action_id: String,
    pub error: String,
}

/// Structured summary of one execution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Actions executed and confirmed in this run.
    pub succeeded: Vec<String>,
    /// Actions skipped because the journal already records success.
    pub reused: Vec<String>,
    /// The action that halted the run, if any.
    pub failed: Option<FailedAction>,
    /// Actions never attempted because of the failure.
    pub unattempted: Vec<String>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Number of chain submissions performed in this run.
    pub fn submissions(&self) -> usize {
        self.succeeded.len() + self.failed.iter().count()
    }
}

/// Execute a module against a chain client, journaling every step.
///
/// Fatal errors (missing artifacts, journal I/O) surface as `Err`; per-action
/// execution failures are captured in the returned report, with the journal
/// left ready for a resumed run.
pub async fn execute<C: ChainClient>(
    module: &Module,
    params: &ResolvedParameters,
    artifacts: &ArtifactStore,
    client: &C,
    journal: &mut Journal,
) -> Result<ExecutionReport> {
    // Fail before any chain action if a deployable contract has no artifact.
    artifacts.ensure_all(module)?;

    let mut report = ExecutionReport::default();

    for index in 0..module.actions().len() {
        let action_id = module.action_id(index);

        if journal.is_success(&action_id) {
            tracing::info!(action = %action_id, "Already deployed, skipping");
            report.reused.push(action_id);
            continue;
        }

        tracing::info!(action = %action_id, "Executing action");
        match run_action(module, index, params, artifacts, client, journal).await {
            Ok(()) => {
                report.succeeded.push(action_id);
            }
            Err(err) if err.is_resumable() => {
                journal.record_failure(&action_id, &err.to_string())?;
                tracing::error!(action = %action_id, error = %err, "Action failed, halting run");

                report.failed = Some(FailedAction {
                    action_id,
                    error: err.to_string(),
                });
                report.unattempted = (index + 1..module.actions().len())
                    .map(|i| module.action_id(i))
                    .filter(|id| !journal.is_success(id))
                    .collect();
                return Ok(report);
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(
        executed = report.succeeded.len(),
        reused = report.reused.len(),
        "Deployment complete"
    );
    Ok(report)
}

/// Execute one action and journal its success.
async fn run_action<C: ChainClient>(
    module: &Module,
    index: usize,
    params: &ResolvedParameters,
    artifacts: &ArtifactStore,
    client: &C,
    journal: &mut Journal,
) -> Result<()> {
    let action_id = module.action_id(index);
    let action = &module.actions()[index];

    match action {
        Action::Deploy { contract, args } => {
            let artifact = artifacts.load(contract)?;
            let args = concrete_args(module, params, journal, args)?;

            let mut data = artifact.bytecode.to_vec();
            data.extend_from_slice(&abi::encode(&args));
            let data = alloy_core::primitives::Bytes::from(data);

            journal.record_pending(&action_id, Some(data.clone()))?;
            let outcome = client
                .deploy(data.clone())
                .await
                .map_err(|e| attribute(e, &action_id))?;

            tracing::info!(
                action = %action_id,
                address = %outcome.address,
                tx_hash = %outcome.tx_hash,
                "Contract deployed"
            );
            journal.record_success(
                &action_id,
                Some(ActionResult::Address(outcome.address)),
                Some(outcome.tx_hash),
                Some(data),
            )
        }
        Action::Call { target, method, args } => {
            let to = producer_address(module, journal, *target);
            let args = concrete_args(module, params, journal, args)?;
            let data = abi::encode_call(method, &args);

            journal.record_pending(&action_id, Some(data.clone()))?;
            let outcome = client
                .send(to, data.clone())
                .await
                .map_err(|e| attribute(e, &action_id))?;

            tracing::info!(action = %action_id, tx_hash = %outcome.tx_hash, "Call confirmed");
            journal.record_success(&action_id, None, Some(outcome.tx_hash), Some(data))
        }
        Action::Read { target, method, args } => {
            let to = producer_address(module, journal, *target);
            let args = concrete_args(module, params, journal, args)?;
            let data = abi::encode_call(method, &args);

            journal.record_pending(&action_id, Some(data.clone()))?;
            let result = client
                .call(to, data.clone())
                .await
                .map_err(|e| attribute(e, &action_id))?;

            tracing::info!(action = %action_id, bytes = result.len(), "Read complete");
            journal.record_success(&action_id, Some(ActionResult::Data(result)), None, Some(data))
        }
        Action::ContractAt { contract, address } => {
            // No chain submission; the binding itself is the result.
            tracing::info!(action = %action_id, contract = %contract, address = %address, "Contract attached");
            journal.record_success(&action_id, Some(ActionResult::Address(*address)), None, None)
        }
    }
}

/// Substitute placeholders with concrete values.
///
/// All producers are already journaled as successful: the traversal is
/// topological and halts on the first failure.
pub(crate) fn concrete_args(
    module: &Module,
    params: &ResolvedParameters,
    journal: &Journal,
    args: &[Arg],
) -> Result<Vec<AbiValue>> {
    args.iter()
        .map(|arg| match arg {
            Arg::Value(value) => Ok(value_to_abi(value)),
            Arg::Param(handle) => params
                .get(&handle.name)
                .map(value_to_abi)
                .ok_or_else(|| Error::UnresolvedParameter {
                    name: handle.name.clone(),
                }),
            Arg::Contract(future) => Ok(AbiValue::Address(producer_address(
                module,
                journal,
                future.index,
            ))),
            Arg::Read(future) => {
                let entry = journal
                    .entry(&module.action_id(future.index))
                    .expect("producer executed before consumer by topological order");
                match &entry.result {
                    Some(ActionResult::Data(bytes)) => Ok(AbiValue::Bytes(bytes.clone())),
                    other => panic!("read future resolved to non-data result: {other:?}"),
                }
            }
        })
        .collect()
}

fn producer_address(
    module: &Module,
    journal: &Journal,
    index: usize,
) -> alloy_core::primitives::Address {
    journal
        .entry(&module.action_id(index))
        .and_then(|entry| entry.result.as_ref())
        .and_then(ActionResult::as_address)
        .expect("producer executed before consumer by topological order")
}

fn value_to_abi(value: &ParamValue) -> AbiValue {
    match value {
        ParamValue::Address(addr) => AbiValue::Address(*addr),
        ParamValue::Uint(u) => AbiValue::Uint(*u),
        ParamValue::String(s) => AbiValue::Str(s.clone()),
        ParamValue::Bool(b) => AbiValue::Bool(*b),
    }
}

/// Attribute a chain-level failure to the action that caused it.
fn attribute(err: ChainError, action_id: &str) -> Error {
    match err {
        ChainError::Reverted(reason) => Error::TransactionReverted {
            action_id: action_id.to_string(),
            reason,
        },
        ChainError::Timeout => Error::TransactionTimeout {
            action_id: action_id.to_string(),
        },
        ChainError::Rpc(message) => Error::RpcConnection(message),
    }
}
