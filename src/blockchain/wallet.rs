//! Wallet adapter seam and a local keypair signer.
//!
//! # Security
//! - Secret keys are loaded from a keypair file or an environment variable
//! - Keys are never logged; `Debug` prints only the public key

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::blockchain::transaction::Transaction;
use crate::blockchain::types::{BlockchainError, BlockchainResult, Pubkey, Signature};

/// Environment variable holding a base58-encoded 64-byte keypair.
pub const KEYPAIR_ENV_VAR: &str = "WALLET_SESSION_KEYPAIR";

/// The signing agent a session talks to.
///
/// Implementations own the user's key material (browser extension, hardware
/// device, local file). The session only ever sees public keys and signed
/// transactions.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Human-readable adapter name for logs.
    fn name(&self) -> &str;

    /// The wallet the user picked, if any. `connect` requires one.
    fn selected_wallet(&self) -> Option<String>;

    /// Ask the wallet for access; resolves to the account's public key.
    async fn connect(&self) -> BlockchainResult<Pubkey>;

    async fn disconnect(&self) -> BlockchainResult<()>;

    /// The connected account, `None` while disconnected.
    fn public_key(&self) -> Option<Pubkey>;

    /// Sign every slot this wallet owns and hand back the signed transaction.
    async fn sign_transaction(&self, tx: Transaction) -> BlockchainResult<Transaction>;
}

/// A wallet backed by an in-process ed25519 keypair.
pub struct KeypairWallet {
    name: String,
    signer: Option<SigningKey>,
    connected: AtomicBool,
}

impl KeypairWallet {
    /// A wallet with no key loaded. Reports no selected wallet.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signer: None,
            connected: AtomicBool::new(false),
        }
    }

    pub fn from_signing_key(name: impl Into<String>, signer: SigningKey) -> Self {
        Self {
            name: name.into(),
            signer: Some(signer),
            connected: AtomicBool::new(false),
        }
    }

    /// Generate a fresh random keypair.
    pub fn generate(name: impl Into<String>) -> Self {
        Self::from_signing_key(name, SigningKey::generate(&mut OsRng))
    }

    /// Load from 64 bytes: 32-byte secret followed by its 32-byte public key.
    pub fn from_keypair_bytes(name: impl Into<String>, bytes: &[u8]) -> BlockchainResult<Self> {
        let bytes: &[u8; 64] = bytes.try_into().map_err(|_| {
            BlockchainError::Wallet(format!("keypair must be 64 bytes, got {}", bytes.len()))
        })?;
        let signer = SigningKey::from_keypair_bytes(bytes)
            .map_err(|_| BlockchainError::Wallet("keypair public half does not match secret".to_string()))?;
        Ok(Self::from_signing_key(name, signer))
    }

    /// Load a keypair file: a JSON array of 64 byte values.
    pub fn from_file(name: impl Into<String>, path: &Path) -> BlockchainResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Wallet(format!("cannot read keypair {}: {}", path.display(), e))
        })?;
        let bytes: Vec<u8> = serde_json::from_str(&content).map_err(|e| {
            BlockchainError::Wallet(format!("keypair {} is not a byte array: {}", path.display(), e))
        })?;
        let wallet = Self::from_keypair_bytes(name, &bytes)?;
        tracing::info!(path = %path.display(), "Keypair loaded from file");
        Ok(wallet)
    }

    /// Load a base58-encoded 64-byte keypair.
    pub fn from_base58(name: impl Into<String>, encoded: &str) -> BlockchainResult<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|_| BlockchainError::Wallet("keypair is not valid base58".to_string()))?;
        Self::from_keypair_bytes(name, &bytes)
    }

    /// Load from `WALLET_SESSION_KEYPAIR`.
    pub fn from_env(name: impl Into<String>) -> BlockchainResult<Self> {
        let encoded = std::env::var(KEYPAIR_ENV_VAR).map_err(|_| {
            BlockchainError::Wallet(format!("Environment variable {} not set", KEYPAIR_ENV_VAR))
        })?;
        Self::from_base58(name, &encoded)
    }

    /// Write the keypair in the JSON byte-array file format.
    ///
    /// On unix the file is readable by its owner only (`0600`), including
    /// when an existing file is overwritten.
    pub fn write_file(&self, path: &Path) -> BlockchainResult<()> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| BlockchainError::Wallet("no keypair loaded".to_string()))?;
        let json = serde_json::to_string(&signer.to_keypair_bytes().to_vec())
            .map_err(|e| BlockchainError::Wallet(e.to_string()))?;

        let write_err = |e: std::io::Error| {
            BlockchainError::Wallet(format!("cannot write keypair {}: {}", path.display(), e))
        };

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)
    }

    /// The keypair's address regardless of connection state.
    pub fn address(&self) -> Option<Pubkey> {
        self.signer
            .as_ref()
            .map(|s| Pubkey(s.verifying_key().to_bytes()))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletAdapter for KeypairWallet {
    fn name(&self) -> &str {
        &self.name
    }

    fn selected_wallet(&self) -> Option<String> {
        self.signer.as_ref().map(|_| self.name.clone())
    }

    async fn connect(&self) -> BlockchainResult<Pubkey> {
        let address = self
            .address()
            .ok_or_else(|| BlockchainError::Wallet("no keypair loaded".to_string()))?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(wallet = %self.name, address = %address, "Keypair wallet connected");
        Ok(address)
    }

    async fn disconnect(&self) -> BlockchainResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        tracing::debug!(wallet = %self.name, "Keypair wallet disconnected");
        Ok(())
    }

    fn public_key(&self) -> Option<Pubkey> {
        if self.is_connected() {
            self.address()
        } else {
            None
        }
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> BlockchainResult<Transaction> {
        if !self.is_connected() {
            return Err(BlockchainError::Signing("wallet is not connected".to_string()));
        }
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| BlockchainError::Signing("no keypair loaded".to_string()))?;
        let address = Pubkey(signer.verifying_key().to_bytes());

        let message = tx.message_data()?;
        let signature = signer.sign(&message);
        tx.add_signature(&address, Signature(signature.to_bytes()))?;
        Ok(tx)
    }
}

impl std::fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("name", &self.name)
            .field("address", &self.address())
            .field("connected", &self.is_connected())
            .finish()
    }
}
