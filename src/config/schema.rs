//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::blockchain::types::Commitment;

/// Root configuration for a wallet session host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// RPC connection settings.
    pub rpc: RpcConfig,

    /// Where the signing key comes from.
    pub wallet: WalletSourceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// RPC connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL.
    pub endpoint: String,

    /// Commitment level for queries and confirmation.
    pub commitment: Commitment,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Upper bound on waiting for a transaction to confirm, in seconds.
    pub confirm_timeout_secs: u64,

    /// Interval between signature status polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Honour HTTP(S)_PROXY environment variables.
    pub system_proxy: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.devnet.solana.com".to_string(),
            commitment: Commitment::Confirmed,
            timeout_secs: 30,
            confirm_timeout_secs: 60,
            poll_interval_ms: 500,
            system_proxy: true,
        }
    }
}

/// Signing key source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletSourceConfig {
    /// Adapter name shown in logs and as the selected wallet.
    pub name: String,

    /// Path to a JSON byte-array keypair file.
    pub keypair_path: Option<String>,
}

impl Default for WalletSourceConfig {
    fn default() -> Self {
        Self {
            name: "local-keypair".to_string(),
            keypair_path: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable output.
    pub json_logs: bool,

    /// Record operation metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}
