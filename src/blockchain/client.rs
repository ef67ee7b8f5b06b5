//! Blockchain RPC connection seam and its JSON-RPC implementation.
//!
//! # Responsibilities
//! - Connect to a JSON-RPC endpoint at a fixed commitment level
//! - Query balances and recent blockhashes
//! - Submit raw transactions and wait for confirmation
//! - Bound every request by a timeout; never retry

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::blockchain::types::{
    BlockchainError, BlockchainResult, Commitment, Hash, Pubkey, Signature,
};
use crate::config::RpcConfig;
use crate::observability::metrics;

/// The network a session reads from and submits to.
#[async_trait]
pub trait RpcConnection: Send + Sync {
    fn endpoint(&self) -> &str;

    fn commitment(&self) -> Commitment;

    /// Balance in lamports.
    async fn get_balance(&self, address: &Pubkey) -> BlockchainResult<u64>;

    async fn get_latest_blockhash(&self) -> BlockchainResult<Hash>;

    /// Submit a serialized, signed transaction. Resolves to its signature.
    async fn send_raw_transaction(&self, tx: &[u8]) -> BlockchainResult<Signature>;

    /// Resolve once the transaction reaches the connection's commitment.
    async fn confirm_transaction(&self, signature: &Signature) -> BlockchainResult<()>;
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    #[allow(dead_code)]
    last_valid_block_height: u64,
}

/// Status of a submitted transaction as reported by `getSignatureStatuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None` once the block is rooted.
    pub confirmations: Option<u64>,
    pub err: Option<Value>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Commitment reached, inferring `finalized` for rooted blocks on nodes
    /// that omit `confirmationStatus`.
    pub fn commitment(&self) -> Commitment {
        self.confirmation_status.unwrap_or(if self.confirmations.is_none() {
            Commitment::Finalized
        } else {
            Commitment::Processed
        })
    }
}

/// JSON-RPC 2.0 client over HTTP.
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: url::Url,
    config: RpcConfig,
    timeout_duration: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a new client. No request is made until the first call.
    pub fn new(config: RpcConfig) -> BlockchainResult<Self> {
        let endpoint: url::Url = config.endpoint.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.endpoint, e))
        })?;
        let mut builder = reqwest::Client::builder();
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| BlockchainError::Rpc(format!("HTTP client setup failed: {}", e)))?;

        tracing::info!(
            endpoint = %endpoint,
            commitment = %config.commitment,
            "RPC client initialized"
        );

        Ok(Self {
            http,
            endpoint,
            timeout_duration: Duration::from_secs(config.timeout_secs),
            config,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> BlockchainResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let call = async {
            let response = self
                .http
                .post(self.endpoint.clone())
                .json(&body)
                .send()
                .await
                .map_err(|e| BlockchainError::Rpc(format!("{} request failed: {}", method, e)))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(BlockchainError::Rpc(format!(
                    "{} returned HTTP {}: {}",
                    method, status, text
                )));
            }

            let envelope: RpcEnvelope<T> = response.json().await.map_err(|e| {
                BlockchainError::Rpc(format!("{} returned malformed body: {}", method, e))
            })?;

            match (envelope.result, envelope.error) {
                (_, Some(err)) => Err(BlockchainError::RpcResponse {
                    code: err.code,
                    message: err.message,
                }),
                (Some(result), None) => Ok(result),
                (None, None) => Err(BlockchainError::Rpc(format!("{} returned no result", method))),
            }
        };

        let result = match timeout(self.timeout_duration, call).await {
            Ok(result) => result,
            Err(_) => Err(BlockchainError::Timeout(self.config.timeout_secs)),
        };

        metrics::record_rpc_request(method, result.is_ok());
        match &result {
            Ok(_) => tracing::trace!(method, id, "RPC request succeeded"),
            Err(e) => tracing::warn!(method, id, error = %e, "RPC request failed"),
        }
        result
    }

    /// Look up a submitted transaction. `None` while the node has not seen it.
    pub async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> BlockchainResult<Option<SignatureStatus>> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .request(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": true }]),
            )
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    /// Check if the node reports itself healthy.
    pub async fn is_healthy(&self) -> bool {
        let healthy = matches!(
            self.request::<String>("getHealth", json!([])).await.as_deref(),
            Ok("ok")
        );
        metrics::record_rpc_health(healthy);
        healthy
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }
}

#[async_trait]
impl RpcConnection for RpcClient {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn commitment(&self) -> Commitment {
        self.config.commitment
    }

    async fn get_balance(&self, address: &Pubkey) -> BlockchainResult<u64> {
        let balance: WithContext<u64> = self
            .request(
                "getBalance",
                json!([address.to_string(), { "commitment": self.config.commitment }]),
            )
            .await?;
        Ok(balance.value)
    }

    async fn get_latest_blockhash(&self) -> BlockchainResult<Hash> {
        let latest: WithContext<BlockhashValue> = self
            .request(
                "getLatestBlockhash",
                json!([{ "commitment": self.config.commitment }]),
            )
            .await?;
        latest.value.blockhash.parse()
    }

    async fn send_raw_transaction(&self, tx: &[u8]) -> BlockchainResult<Signature> {
        let signature: String = self
            .request(
                "sendTransaction",
                json!([
                    BASE64.encode(tx),
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.config.commitment,
                    }
                ]),
            )
            .await?;
        signature.parse()
    }

    async fn confirm_transaction(&self, signature: &Signature) -> BlockchainResult<()> {
        let target = self.config.commitment;
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let deadline = Duration::from_secs(self.config.confirm_timeout_secs);

        let result = timeout(deadline, async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                let status = match self.get_signature_status(signature).await? {
                    Some(s) => s,
                    None => {
                        tracing::debug!(signature = %signature, "Transaction pending");
                        continue;
                    }
                };

                if let Some(err) = status.err {
                    return Err(BlockchainError::TransactionFailed(err.to_string()));
                }

                let reached = status.commitment();
                if reached >= target {
                    tracing::debug!(
                        signature = %signature,
                        slot = status.slot,
                        commitment = %reached,
                        "Transaction confirmed"
                    );
                    return Ok(());
                }

                tracing::debug!(
                    signature = %signature,
                    current = %reached,
                    required = %target,
                    "Waiting for confirmation"
                );
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(BlockchainError::ConfirmationTimeout(self.config.confirm_timeout_secs)),
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("commitment", &self.config.commitment)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}
