//! Wallet session management over pluggable signers and JSON-RPC nodes.

pub mod blockchain;
pub mod config;
pub mod observability;
pub mod session;

pub use config::WalletConfig;
pub use session::{ConnectionStatus, SessionError, SessionEvent, SessionState, WalletSession};
