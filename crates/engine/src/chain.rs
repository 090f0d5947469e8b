//! Chain client interface and its JSON-RPC implementation.
//!
//! The engine only consumes this interface; transaction signing is the
//! node's (or an external signer's) concern, so submissions go through
//! `eth_sendTransaction` from a configured sender account.

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, B256};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Default timeout for a single RPC request.
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between receipt polling attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default maximum time to wait for a transaction confirmation.
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Chain-level failure, before the executor attributes it to an action.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("reverted: {0}")]
    Reverted(String),
    #[error("timed out awaiting confirmation")]
    Timeout,
    #[error("{0}")]
    Rpc(String),
}

/// Outcome of a confirmed deployment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub address: Address,
    pub tx_hash: B256,
}

/// Outcome of a confirmed method-call transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub tx_hash: B256,
}

/// On-chain operations the execution engine needs.
pub trait ChainClient: Send + Sync {
    /// The chain id the client is connected to.
    fn chain_id(&self) -> impl Future<Output = std::result::Result<u64, ChainError>> + Send;

    /// Submit a deployment transaction and await its confirmation.
    fn deploy(
        &self,
        data: Bytes,
    ) -> impl Future<Output = std::result::Result<DeployOutcome, ChainError>> + Send;

    /// Submit a state-changing call and await its confirmation.
    fn send(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = std::result::Result<CallOutcome, ChainError>> + Send;

    /// Execute a read-only call.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = std::result::Result<Bytes, ChainError>> + Send;
}

/// Transaction receipt fields the engine cares about.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    status: Option<String>,
    contract_address: Option<Address>,
}

/// [`ChainClient`] over plain Ethereum JSON-RPC.
#[derive(Debug)]
pub struct HttpChainClient {
    client: reqwest::Client,
    url: String,
    from: Address,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl HttpChainClient {
    pub fn new(url: &str, from: Address) -> Result<Self> {
        url::Url::parse(url).map_err(|e| Error::InvalidConfig {
            reason: format!("invalid RPC url '{url}': {e}"),
        })?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_RPC_TIMEOUT)
            .build()
            .map_err(|e| Error::InvalidConfig {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
            from,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        })
    }

    /// Override confirmation polling settings (tests, slow networks).
    pub fn with_confirmation(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.confirmation_timeout = timeout;
        self
    }

    /// Make a JSON-RPC call and deserialize the result.
    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> std::result::Result<T, ChainError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to send {method} request: {e}")))?;

        let result: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to parse {method} response: {e}")))?;

        if let Some(error) = result.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string();
            // Node-side revert simulation surfaces as an RPC error.
            if message.to_lowercase().contains("revert") {
                return Err(ChainError::Reverted(message));
            }
            return Err(ChainError::Rpc(message));
        }

        let result_value = result
            .get("result")
            .ok_or_else(|| ChainError::Rpc(format!("no result in {method} response")))?
            .clone();

        serde_json::from_value(result_value)
            .map_err(|e| ChainError::Rpc(format!("failed to deserialize {method} result: {e}")))
    }

    /// Poll for a transaction receipt until confirmation or timeout.
    async fn wait_for_receipt(&self, tx_hash: B256) -> std::result::Result<Receipt, ChainError> {
        let start = std::time::Instant::now();

        loop {
            if start.elapsed() > self.confirmation_timeout {
                return Err(ChainError::Timeout);
            }

            let receipt: Option<Receipt> = self
                .rpc(
                    "eth_getTransactionReceipt",
                    vec![serde_json::json!(tx_hash)],
                )
                .await?;

            match receipt {
                Some(receipt) => {
                    if receipt.status.as_deref() == Some("0x0") {
                        return Err(ChainError::Reverted("execution reverted".to_string()));
                    }
                    return Ok(receipt);
                }
                None => {
                    tracing::trace!(tx_hash = %tx_hash, "Receipt not yet available, polling...");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

impl ChainClient for HttpChainClient {
    async fn chain_id(&self) -> std::result::Result<u64, ChainError> {
        let hex: String = self.rpc("eth_chainId", vec![]).await?;
        u64_from_hex(&hex)
    }

    async fn deploy(&self, data: Bytes) -> std::result::Result<DeployOutcome, ChainError> {
        let tx_hash: B256 = self
            .rpc(
                "eth_sendTransaction",
                vec![serde_json::json!({
                    "from": self.from,
                    "data": data,
                })],
            )
            .await?;

        tracing::debug!(tx_hash = %tx_hash, "Deployment transaction sent");
        let receipt = self.wait_for_receipt(tx_hash).await?;

        let address = receipt.contract_address.ok_or_else(|| {
            ChainError::Rpc("deployment receipt carries no contract address".to_string())
        })?;

        Ok(DeployOutcome { address, tx_hash })
    }

    async fn send(&self, to: Address, data: Bytes) -> std::result::Result<CallOutcome, ChainError> {
        let tx_hash: B256 = self
            .rpc(
                "eth_sendTransaction",
                vec![serde_json::json!({
                    "from": self.from,
                    "to": to,
                    "data": data,
                })],
            )
            .await?;

        tracing::debug!(tx_hash = %tx_hash, to = %to, "Call transaction sent");
        self.wait_for_receipt(tx_hash).await?;

        Ok(CallOutcome { tx_hash })
    }

    async fn call(&self, to: Address, data: Bytes) -> std::result::Result<Bytes, ChainError> {
        self.rpc(
            "eth_call",
            vec![
                serde_json::json!({ "to": to, "data": data }),
                serde_json::json!("latest"),
            ],
        )
        .await
    }
}

/// Parse a u64 from a 0x-prefixed hex string.
fn u64_from_hex(s: &str) -> std::result::Result<u64, ChainError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ChainError::Rpc(format!("invalid hex quantity '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(u64_from_hex("0x1").unwrap(), 1);
        assert_eq!(u64_from_hex("0x8274f").unwrap(), 534351);
        assert!(u64_from_hex("nope").is_err());
    }

    #[test]
    fn invalid_rpc_url_is_a_config_error() {
        let err = HttpChainClient::new("not a url", Address::ZERO).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
