//! Block-explorer source verification.
//!
//! Best-effort by design: verification runs only over successfully deployed
//! contracts, and no submission failure ever affects the deployment itself.

use std::time::Duration;

use alloy_core::primitives::Address;
use backon::{BackoffBuilder, ExponentialBuilder};
use serde::Deserialize;

use crate::abi;
use crate::artifacts::ArtifactStore;
use crate::error::{Error, Result};
use crate::executor::concrete_args;
use crate::journal::{ActionResult, Journal};
use crate::module::{Action, Module};
use crate::params::ResolvedParameters;

/// Terminal and in-flight states of a verification submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VerificationStatus {
    Submitted,
    Pending,
    Verified,
    Failed,
}

/// Outcome of submitting one contract for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub action_id: String,
    pub contract: String,
    pub address: Address,
    /// Hex-encoded constructor arguments, without 0x prefix.
    pub constructor_args_encoded: String,
    pub compiler_version: String,
    pub status: VerificationStatus,
    pub detail: Option<String>,
}

/// Everything an explorer needs to match bytecode to source.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    /// `<source path>:<contract name>`, e.g. `contracts/Escrow.sol:USDT_Escrow`.
    pub contract_name: String,
    pub source: String,
    pub compiler_version: String,
    /// Hex-encoded constructor arguments, without 0x prefix.
    pub constructor_args: String,
}

/// Response to a verification submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    /// Accepted; poll with this submission id.
    Submitted(String),
    /// The explorer already has matching verified source.
    AlreadyVerified,
}

/// Explorer verification API.
pub trait ExplorerClient: Send + Sync {
    fn submit(
        &self,
        request: &VerificationRequest,
    ) -> impl std::future::Future<Output = Result<SubmitResponse>> + Send;

    fn check(
        &self,
        submission_id: &str,
    ) -> impl std::future::Future<Output = Result<VerificationStatus>> + Send;
}

/// Submit every successfully deployed contract of a run for verification and
/// poll each submission to a terminal state (bounded wait).
///
/// Returns one record per deploy action. Per-contract failures are recorded,
/// never propagated.
pub async fn verify_deployments<E: ExplorerClient>(
    module: &Module,
    params: &ResolvedParameters,
    artifacts: &ArtifactStore,
    journal: &Journal,
    explorer: &E,
) -> Result<Vec<VerificationRecord>> {
    let mut records = Vec::new();

    for (index, action) in module.actions().iter().enumerate() {
        let Action::Deploy { contract, args } = action else {
            continue;
        };
        let action_id = module.action_id(index);

        if !journal.is_success(&action_id) {
            tracing::debug!(action = %action_id, "Not deployed, skipping verification");
            continue;
        }
        let address = journal
            .entry(&action_id)
            .and_then(|e| e.result.as_ref())
            .and_then(ActionResult::as_address)
            .expect("successful deploy entry carries an address");

        let artifact = artifacts.load(contract)?;
        let encoded_args = hex::encode(abi::encode(&concrete_args(
            module, params, journal, args,
        )?));

        let mut record = VerificationRecord {
            action_id: action_id.clone(),
            contract: contract.clone(),
            address,
            constructor_args_encoded: encoded_args.clone(),
            compiler_version: artifact.compiler_version.clone(),
            status: VerificationStatus::Submitted,
            detail: None,
        };

        let Some(source) = artifact.source else {
            tracing::warn!(contract = %contract, "Artifact has no source, cannot verify");
            record.status = VerificationStatus::Failed;
            record.detail = Some("artifact has no flattened source".to_string());
            records.push(record);
            continue;
        };

        let request = VerificationRequest {
            address,
            contract_name: format!("{}:{}", artifact.source_name, contract),
            source,
            compiler_version: artifact.compiler_version.clone(),
            constructor_args: encoded_args,
        };

        let (status, detail) = submit_and_poll(explorer, &request, &action_id).await;
        record.status = status;
        record.detail = detail;
        records.push(record);
    }

    Ok(records)
}

/// Submit one request and poll its status with bounded exponential backoff.
/// Exhausting the backoff degrades to `Pending` rather than blocking forever.
async fn submit_and_poll<E: ExplorerClient>(
    explorer: &E,
    request: &VerificationRequest,
    action_id: &str,
) -> (VerificationStatus, Option<String>) {
    let submission_id = match explorer.submit(request).await {
        Ok(SubmitResponse::Submitted(id)) => id,
        Ok(SubmitResponse::AlreadyVerified) => {
            tracing::info!(action = %action_id, "Source already verified");
            return (VerificationStatus::Verified, Some("already verified".to_string()));
        }
        Err(e) => {
            tracing::warn!(action = %action_id, error = %e, "Verification submission failed");
            return (VerificationStatus::Failed, Some(e.to_string()));
        }
    };

    tracing::info!(action = %action_id, submission_id = %submission_id, "Verification submitted");

    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(2))
        .with_max_delay(Duration::from_secs(30))
        .with_max_times(8)
        .build();

    loop {
        match explorer.check(&submission_id).await {
            Ok(VerificationStatus::Verified) => {
                tracing::info!(action = %action_id, "Source verified");
                return (VerificationStatus::Verified, None);
            }
            Ok(VerificationStatus::Failed) => {
                tracing::warn!(action = %action_id, "Explorer rejected the submitted source");
                return (VerificationStatus::Failed, Some("explorer rejected source".to_string()));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(action = %action_id, error = %e, "Verification status check failed");
                return (VerificationStatus::Failed, Some(e.to_string()));
            }
        }

        match backoff.next() {
            Some(delay) => tokio::time::sleep(delay).await,
            None => {
                tracing::warn!(
                    action = %action_id,
                    "Verification still pending after maximum wait, giving up"
                );
                return (
                    VerificationStatus::Pending,
                    Some("still pending after maximum wait".to_string()),
                );
            }
        }
    }
}

/// Etherscan-compatible response envelope (both submit and status endpoints).
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    result: String,
}

/// [`ExplorerClient`] for Etherscan-compatible APIs (Scrollscan et al.).
#[derive(Debug)]
pub struct EtherscanClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl EtherscanClient {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self> {
        url::Url::parse(api_url).map_err(|e| Error::InvalidConfig {
            reason: format!("invalid explorer API url '{api_url}': {e}"),
        })?;
        if api_key.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "explorer API key is empty".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::InvalidConfig {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<EtherscanResponse> {
        let response = self
            .client
            .post(&self.api_url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::VerificationSubmission {
                reason: format!("explorer request failed: {e}"),
            })?;

        response
            .json()
            .await
            .map_err(|e| Error::VerificationSubmission {
                reason: format!("malformed explorer response: {e}"),
            })
    }
}

impl ExplorerClient for EtherscanClient {
    async fn submit(&self, request: &VerificationRequest) -> Result<SubmitResponse> {
        let address = request.address.to_string();
        let response = self
            .post_form(&[
                ("module", "contract"),
                ("action", "verifysourcecode"),
                ("apikey", &self.api_key),
                ("contractaddress", &address),
                ("sourceCode", &request.source),
                ("codeformat", "solidity-single-file"),
                ("contractname", &request.contract_name),
                ("compilerversion", &request.compiler_version),
                // Field name spelling is the Etherscan API's, not ours.
                ("constructorArguements", &request.constructor_args),
            ])
            .await?;

        if response.status == "1" {
            return Ok(SubmitResponse::Submitted(response.result));
        }
        if response.result.to_lowercase().contains("already verified") {
            return Ok(SubmitResponse::AlreadyVerified);
        }
        Err(Error::VerificationSubmission {
            reason: response.result,
        })
    }

    async fn check(&self, submission_id: &str) -> Result<VerificationStatus> {
        let response = self
            .post_form(&[
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("apikey", &self.api_key),
                ("guid", submission_id),
            ])
            .await?;

        Ok(status_from_result(&response.result))
    }
}

/// Map an Etherscan `checkverifystatus` result string to a status.
fn status_from_result(result: &str) -> VerificationStatus {
    let lowered = result.to_lowercase();
    if lowered.contains("pass") || lowered.contains("already verified") {
        VerificationStatus::Verified
    } else if lowered.contains("pending") || lowered.contains("queue") {
        VerificationStatus::Pending
    } else {
        VerificationStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_map_to_statuses() {
        assert_eq!(status_from_result("Pass - Verified"), VerificationStatus::Verified);
        assert_eq!(status_from_result("Pending in queue"), VerificationStatus::Pending);
        assert_eq!(
            status_from_result("Fail - Unable to verify"),
            VerificationStatus::Failed
        );
        assert_eq!(
            status_from_result("Already Verified"),
            VerificationStatus::Verified
        );
    }

    #[test]
    fn empty_api_key_is_a_config_error() {
        let err = EtherscanClient::new("https://api-sepolia.scrollscan.com/api", "").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn invalid_api_url_is_a_config_error() {
        let err = EtherscanClient::new("not a url", "key").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
