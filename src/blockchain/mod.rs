//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! keypair file / environment
//!     → wallet.rs (WalletAdapter: connect, sign)
//! transfer request
//!     → transaction.rs (build message, wire encoding)
//!     → wallet.rs (sign)
//!     → client.rs (RpcConnection: submit, confirm, balance)
//! ```
//!
//! # Security Constraints
//! - Secret keys never leave the wallet adapter
//! - Never log secret keys
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{RpcClient, RpcConnection};
pub use transaction::{system_transfer, Transaction};
pub use types::{BlockchainError, BlockchainResult, Commitment, Hash, Pubkey, Signature};
pub use wallet::{KeypairWallet, WalletAdapter};
