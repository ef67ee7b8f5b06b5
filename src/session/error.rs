//! Session error kinds.

use thiserror::Error;

use crate::blockchain::types::{lamports_to_sol, BlockchainError};

fn sol(lamports: &u64) -> f64 {
    lamports_to_sol(*lamports)
}

/// Why a session operation failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("No wallet selected")]
    NoWalletSelected,

    #[error("Wallet connection failed: {0}")]
    ConnectFailed(String),

    #[error("Wallet disconnect failed: {0}")]
    DisconnectFailed(String),

    #[error("Balance fetch failed: {0}")]
    BalanceFetchFailed(String),

    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),

    #[error(
        "Insufficient balance: requested {} SOL, available {} SOL",
        sol(.requested),
        sol(.available)
    )]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Transfer amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("Another wallet operation is already in progress")]
    OperationInProgress,
}

impl SessionError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::NoWalletSelected => "no_wallet_selected",
            SessionError::ConnectFailed(_) => "connect_failed",
            SessionError::DisconnectFailed(_) => "disconnect_failed",
            SessionError::BalanceFetchFailed(_) => "balance_fetch_failed",
            SessionError::InvalidAddress(_) => "invalid_address",
            SessionError::InsufficientBalance { .. } => "insufficient_balance",
            SessionError::TransferFailed(_) => "transfer_failed",
            SessionError::NotConnected => "not_connected",
            SessionError::InvalidAmount(_) => "invalid_amount",
            SessionError::OperationInProgress => "operation_in_progress",
        }
    }

    pub(crate) fn transfer(err: BlockchainError) -> Self {
        SessionError::TransferFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_message_uses_display_unit() {
        let err = SessionError::InsufficientBalance {
            requested: 20_000_000,
            available: 10_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: requested 0.02 SOL, available 0.01 SOL"
        );
        assert_eq!(err.kind(), "insufficient_balance");
    }

    #[test]
    fn test_transfer_wraps_blockchain_error() {
        let err = SessionError::transfer(BlockchainError::Timeout(30));
        assert_eq!(err.to_string(), "Transfer failed: RPC timeout after 30 seconds");
    }
}
