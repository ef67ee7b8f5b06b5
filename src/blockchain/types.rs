//! Chain-specific types and error definitions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest-unit divisor for the native token.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Longest base58 rendering of a 32-byte value.
const MAX_PUBKEY_BASE58_LEN: usize = 44;

/// Convert lamports to the display unit.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert a display-unit amount to lamports, rounding to the nearest lamport.
///
/// Returns `None` for negative, non-finite, or out-of-range amounts.
pub fn sol_to_lamports(sol: f64) -> Option<u64> {
    if !sol.is_finite() || sol < 0.0 {
        return None;
    }
    let lamports = (sol * LAMPORTS_PER_SOL as f64).round();
    if lamports > u64::MAX as f64 {
        return None;
    }
    Some(lamports as u64)
}

fn decode_base58<const N: usize>(s: &str, kind: &str) -> Result<[u8; N], String> {
    if s.is_empty() {
        return Err(format!("empty {}", kind));
    }
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| format!("{} '{}' is not valid base58: {}", kind, s, e))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("{} '{}' decodes to {} bytes, expected {}", kind, s, len, N))
}

/// An ed25519 public key, rendered as base58.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Pubkey {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_PUBKEY_BASE58_LEN {
            return Err(BlockchainError::InvalidAddress(format!(
                "address is {} characters, at most {} allowed",
                s.len(),
                MAX_PUBKEY_BASE58_LEN
            )));
        }
        decode_base58::<32>(s, "address")
            .map(Self)
            .map_err(BlockchainError::InvalidAddress)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

/// A 64-byte ed25519 signature. The first signature of a transaction is its id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// True for the all-zero placeholder of an unsigned slot.
    pub fn is_placeholder(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl FromStr for Signature {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58::<64>(s, "signature")
            .map(Self)
            .map_err(BlockchainError::Encoding)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

/// A 32-byte block hash used as a transaction's recent blockhash.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash(pub [u8; 32]);

impl FromStr for Hash {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58::<32>(s, "blockhash")
            .map(Self)
            .map_err(BlockchainError::Encoding)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

macro_rules! serde_as_base58 {
    ($($ty:ty),*) => {$(
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    )*};
}

serde_as_base58!(Pubkey, Signature, Hash);

/// Confirmation depth targeted by queries and confirmation polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl FromStr for Commitment {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(BlockchainError::Encoding(format!(
                "unknown commitment level '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Transport-level RPC failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC returned error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Malformed account address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed wire data (signatures, hashes, transactions).
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid key material or wallet state.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The signer rejected or could not sign.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction not confirmed after {0} seconds")]
    ConfirmationTimeout(u64),

    /// Transaction landed but the runtime reported an error.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;
