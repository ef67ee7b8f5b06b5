//! Session state record.
//!
//! # States
//! ```text
//! Disconnected → Connecting → Connected → Disconnecting → Disconnected
//! ```
//! A failed transition falls back to the state it started from.
//!
//! # Invariants
//! - `address` and `balance` are `Some` iff `status == Connected`
//! - `is_loading` is true only while an operation is in flight

use serde::Serialize;

use crate::blockchain::types::{lamports_to_sol, Pubkey};

/// Wallet connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnecting => "disconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a wallet session, as read by a display layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub status: ConnectionStatus,
    pub address: Option<Pubkey>,
    /// Balance in lamports.
    pub balance: Option<u64>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Balance in the display unit; zero while disconnected.
    pub fn balance_sol(&self) -> f64 {
        self.balance.map(lamports_to_sol).unwrap_or(0.0)
    }

    /// True when address/balance presence agrees with the status.
    pub fn is_consistent(&self) -> bool {
        let populated = self.address.is_some() && self.balance.is_some();
        let empty = self.address.is_none() && self.balance.is_none();
        if self.is_connected() {
            populated
        } else {
            empty
        }
    }

    pub(crate) fn mark_connected(&mut self, address: Pubkey) {
        self.status = ConnectionStatus::Connected;
        self.address = Some(address);
        self.balance = Some(0);
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.address = None;
        self.balance = None;
    }
}
