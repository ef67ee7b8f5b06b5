//! Wallet session manager.
//!
//! # Responsibilities
//! - Own the session state and publish snapshots to readers
//! - Drive connect / disconnect / refresh-balance / transfer against the
//!   injected wallet adapter and RPC connection
//! - Allow one operation in flight at a time
//! - Turn every failure into `last_error`, an event, and an `Err`
//!
//! # Concurrency
//! A second operation started while one is running fails fast with
//! `OperationInProgress` and leaves state untouched. Implicit balance
//! refreshes run under the guard of the operation that triggered them.

use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use uuid::Uuid;

use crate::blockchain::client::{RpcClient, RpcConnection};
use crate::blockchain::transaction::system_transfer;
use crate::blockchain::types::{
    lamports_to_sol, sol_to_lamports, BlockchainError, BlockchainResult, Pubkey, Signature,
};
use crate::blockchain::wallet::{KeypairWallet, WalletAdapter, KEYPAIR_ENV_VAR};
use crate::config::WalletConfig;
use crate::observability::metrics;
use crate::session::error::SessionError;
use crate::session::events::{EventBus, Operation, SessionEvent};
use crate::session::state::{ConnectionStatus, SessionState};

struct OpContext {
    id: Uuid,
    operation: Operation,
    started: Instant,
}

impl OpContext {
    fn new(operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            started: Instant::now(),
        }
    }
}

/// Holds the in-flight permit; clears `is_loading` when dropped.
///
/// If the operation future is dropped mid-transition, the session falls
/// back to the stable state it started from.
struct InFlight<'a> {
    session: &'a WalletSession,
    operation_id: Uuid,
    stable: SessionState,
    _permit: MutexGuard<'a, ()>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut abandoned = None;
        self.session.update(|s| {
            s.is_loading = false;
            match s.status {
                ConnectionStatus::Connecting => {
                    abandoned = Some(s.status);
                    s.mark_disconnected();
                }
                ConnectionStatus::Disconnecting => {
                    abandoned = Some(s.status);
                    s.status = ConnectionStatus::Connected;
                    s.address = self.stable.address;
                    s.balance = self.stable.balance;
                }
                ConnectionStatus::Connected | ConnectionStatus::Disconnected => {}
            }
        });

        if let Some(from) = abandoned {
            let to = self.session.state.load().status;
            tracing::warn!(
                operation_id = %self.operation_id,
                from = %from,
                to = %to,
                "Wallet operation cancelled mid-transition"
            );
            self.session.events.publish(SessionEvent::StatusChanged {
                operation_id: self.operation_id,
                from,
                to,
            });
        }
    }
}

/// A wallet session over an injected wallet adapter and RPC connection.
pub struct WalletSession {
    wallet: Arc<dyn WalletAdapter>,
    rpc: RwLock<Option<Arc<dyn RpcConnection>>>,
    state: ArcSwap<SessionState>,
    in_flight: Mutex<()>,
    events: EventBus,
}

impl WalletSession {
    pub fn new(wallet: Arc<dyn WalletAdapter>, rpc: Option<Arc<dyn RpcConnection>>) -> Self {
        Self {
            wallet,
            rpc: RwLock::new(rpc),
            state: ArcSwap::from_pointee(SessionState::default()),
            in_flight: Mutex::new(()),
            events: EventBus::default(),
        }
    }

    /// Build a session with a keypair wallet and JSON-RPC client from config.
    ///
    /// The keypair comes from `wallet.keypair_path`, then from the
    /// `WALLET_SESSION_KEYPAIR` variable. With neither, the session starts
    /// with no wallet selected.
    pub fn from_config(config: &WalletConfig) -> BlockchainResult<Self> {
        let name = config.wallet.name.clone();
        let wallet = match &config.wallet.keypair_path {
            Some(path) => KeypairWallet::from_file(name, Path::new(path))?,
            None if std::env::var_os(KEYPAIR_ENV_VAR).is_some() => KeypairWallet::from_env(name)?,
            None => KeypairWallet::empty(name),
        };
        let rpc = RpcClient::new(config.rpc.clone())?;
        Ok(Self::new(Arc::new(wallet), Some(Arc::new(rpc))))
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        SessionState::clone(&self.state.load())
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn wallet(&self) -> &Arc<dyn WalletAdapter> {
        &self.wallet
    }

    pub fn attach_rpc(&self, rpc: Arc<dyn RpcConnection>) {
        *self.rpc.write().unwrap_or_else(PoisonError::into_inner) = Some(rpc);
    }

    /// Drop the RPC connection; balance refreshes become no-ops.
    pub fn detach_rpc(&self) {
        *self.rpc.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn rpc(&self) -> Option<Arc<dyn RpcConnection>> {
        self.rpc
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // --- State plumbing ---

    fn update<F: FnOnce(&mut SessionState)>(&self, f: F) {
        let mut next = self.state();
        f(&mut next);
        self.state.store(Arc::new(next));
    }

    fn acquire(&self) -> Result<MutexGuard<'_, ()>, SessionError> {
        self.in_flight
            .try_lock()
            .map_err(|_| SessionError::OperationInProgress)
    }

    fn start<'a>(&'a self, ctx: &OpContext, permit: MutexGuard<'a, ()>) -> InFlight<'a> {
        let stable = self.state();
        self.update(|s| {
            s.is_loading = true;
            s.last_error = None;
        });
        InFlight {
            session: self,
            operation_id: ctx.id,
            stable,
            _permit: permit,
        }
    }

    fn transition<F: FnOnce(&mut SessionState)>(&self, id: Uuid, to: ConnectionStatus, apply: F) {
        let mut from = to;
        self.update(|s| {
            from = s.status;
            apply(s);
            s.status = to;
        });
        tracing::debug!(operation_id = %id, from = %from, to = %to, "Session status changed");
        self.events.publish(SessionEvent::StatusChanged {
            operation_id: id,
            from,
            to,
        });
    }

    fn record_failure(&self, id: Uuid, operation: Operation, err: &SessionError) {
        self.update(|s| s.last_error = Some(err.to_string()));
        tracing::warn!(
            operation_id = %id,
            operation = %operation,
            kind = err.kind(),
            error = %err,
            "Wallet operation failed"
        );
        self.events.publish(SessionEvent::OperationFailed {
            operation_id: id,
            operation,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn finish<T>(&self, ctx: &OpContext, result: Result<T, SessionError>) -> Result<T, SessionError> {
        metrics::record_operation(ctx.operation.as_str(), result.is_ok(), ctx.started.elapsed());
        match &result {
            Ok(_) => tracing::debug!(
                operation_id = %ctx.id,
                operation = %ctx.operation,
                elapsed_ms = ctx.started.elapsed().as_millis() as u64,
                "Wallet operation completed"
            ),
            Err(err) => self.record_failure(ctx.id, ctx.operation, err),
        }
        result
    }

    // --- Operations ---

    /// Connect the selected wallet and load its balance.
    ///
    /// Connecting an already connected session returns the current address.
    /// A failed implicit balance refresh is recorded in `last_error` but does
    /// not fail the connect.
    pub async fn connect(&self) -> Result<Pubkey, SessionError> {
        let permit = self.acquire()?;
        let current = self.state();
        if let (ConnectionStatus::Connected, Some(address)) = (current.status, current.address) {
            return Ok(address);
        }

        let ctx = OpContext::new(Operation::Connect);
        let _loading = self.start(&ctx, permit);
        let result = self.connect_inner(&ctx).await;
        self.finish(&ctx, result)
    }

    async fn connect_inner(&self, ctx: &OpContext) -> Result<Pubkey, SessionError> {
        let selected = self
            .wallet
            .selected_wallet()
            .ok_or(SessionError::NoWalletSelected)?;
        tracing::info!(operation_id = %ctx.id, wallet = %selected, "Connecting wallet");

        self.transition(ctx.id, ConnectionStatus::Connecting, |_| {});
        let address = match self.wallet.connect().await {
            Ok(address) => address,
            Err(e) => {
                self.transition(ctx.id, ConnectionStatus::Disconnected, SessionState::mark_disconnected);
                return Err(SessionError::ConnectFailed(e.to_string()));
            }
        };

        self.transition(ctx.id, ConnectionStatus::Connected, |s| s.mark_connected(address));
        tracing::info!(operation_id = %ctx.id, address = %address, "Wallet connected");

        if let Err(e) = self.refresh_inner(ctx.id).await {
            self.record_failure(ctx.id, Operation::RefreshBalance, &e);
        }
        Ok(address)
    }

    /// Disconnect the wallet and clear address and balance.
    ///
    /// If the adapter rejects, the session returns to `Connected` with its
    /// previous address and balance.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let permit = self.acquire()?;
        let ctx = OpContext::new(Operation::Disconnect);
        let previous = self.state();
        if !previous.is_connected() {
            return self.finish(&ctx, Err(SessionError::NotConnected));
        }

        let _loading = self.start(&ctx, permit);
        self.transition(ctx.id, ConnectionStatus::Disconnecting, |s| {
            s.address = None;
            s.balance = None;
        });

        let result = match self.wallet.disconnect().await {
            Ok(()) => {
                self.transition(ctx.id, ConnectionStatus::Disconnected, SessionState::mark_disconnected);
                tracing::info!(operation_id = %ctx.id, "Wallet disconnected");
                Ok(())
            }
            Err(e) => {
                self.transition(ctx.id, ConnectionStatus::Connected, |s| {
                    s.address = previous.address;
                    s.balance = previous.balance;
                });
                Err(SessionError::DisconnectFailed(e.to_string()))
            }
        };
        self.finish(&ctx, result)
    }

    /// Fetch the balance of the connected account.
    ///
    /// Returns `Ok(None)` without touching state when disconnected or when no
    /// RPC connection is attached, even while another operation is running.
    pub async fn refresh_balance(&self) -> Result<Option<u64>, SessionError> {
        if !self.can_refresh() {
            tracing::trace!("Balance refresh skipped");
            return Ok(None);
        }
        let permit = self.acquire()?;
        if !self.can_refresh() {
            return Ok(None);
        }

        let ctx = OpContext::new(Operation::RefreshBalance);
        let _loading = self.start(&ctx, permit);
        let result = self.refresh_inner(ctx.id).await;
        self.finish(&ctx, result)
    }

    fn can_refresh(&self) -> bool {
        self.state().is_connected() && self.rpc().is_some()
    }

    async fn refresh_inner(&self, id: Uuid) -> Result<Option<u64>, SessionError> {
        let state = self.state();
        let (Some(address), Some(rpc)) = (state.address.filter(|_| state.is_connected()), self.rpc())
        else {
            return Ok(None);
        };

        let lamports = rpc
            .get_balance(&address)
            .await
            .map_err(|e| SessionError::BalanceFetchFailed(e.to_string()))?;

        self.update(|s| {
            if s.is_connected() {
                s.balance = Some(lamports);
            }
        });
        metrics::record_balance(lamports);
        tracing::debug!(operation_id = %id, address = %address, lamports, "Balance updated");
        self.events.publish(SessionEvent::BalanceUpdated {
            operation_id: id,
            lamports,
        });
        Ok(Some(lamports))
    }

    /// Send `amount` (display units) of the native token to `destination`.
    ///
    /// The balance check is client-side only; the network enforces the real
    /// constraint including fees. On success the balance is refreshed and
    /// the transaction signature returned.
    pub async fn send_test_transfer(
        &self,
        destination: &str,
        amount: f64,
    ) -> Result<Signature, SessionError> {
        let permit = self.acquire()?;
        let ctx = OpContext::new(Operation::SendTransfer);
        let _loading = self.start(&ctx, permit);
        let result = self.transfer_inner(&ctx, destination, amount).await;
        self.finish(&ctx, result)
    }

    async fn transfer_inner(
        &self,
        ctx: &OpContext,
        destination: &str,
        amount: f64,
    ) -> Result<Signature, SessionError> {
        let state = self.state();
        let (ConnectionStatus::Connected, Some(from), Some(balance)) =
            (state.status, state.address, state.balance)
        else {
            return Err(SessionError::NotConnected);
        };

        if !amount.is_finite() || amount <= 0.0 {
            return Err(SessionError::InvalidAmount(amount));
        }
        let to: Pubkey = destination.parse().map_err(|e| match e {
            BlockchainError::InvalidAddress(msg) => SessionError::InvalidAddress(msg),
            other => SessionError::InvalidAddress(other.to_string()),
        })?;
        let lamports = sol_to_lamports(amount)
            .filter(|l| *l > 0)
            .ok_or(SessionError::InvalidAmount(amount))?;
        // Sub-lamport amounts must not round under the balance
        if lamports > balance || amount > lamports_to_sol(balance) {
            return Err(SessionError::InsufficientBalance {
                requested: lamports,
                available: balance,
            });
        }
        let rpc = self
            .rpc()
            .ok_or_else(|| SessionError::TransferFailed("no RPC connection".to_string()))?;

        tracing::info!(
            operation_id = %ctx.id,
            from = %from,
            to = %to,
            lamports,
            "Sending transfer"
        );

        let blockhash = rpc
            .get_latest_blockhash()
            .await
            .map_err(SessionError::transfer)?;
        let unsigned = system_transfer(&from, &to, lamports, blockhash);
        let expected = unsigned.message.clone();

        let signed = self
            .wallet
            .sign_transaction(unsigned)
            .await
            .map_err(SessionError::transfer)?;
        if signed.message != expected {
            return Err(SessionError::TransferFailed(
                "wallet returned a different transaction".to_string(),
            ));
        }
        if !signed.is_signed() {
            return Err(SessionError::TransferFailed(
                "transaction not fully signed".to_string(),
            ));
        }
        if !signed.verify() {
            return Err(SessionError::TransferFailed(
                "signature does not verify against the payer key".to_string(),
            ));
        }

        let raw = signed.serialize().map_err(SessionError::transfer)?;
        let signature = rpc
            .send_raw_transaction(&raw)
            .await
            .map_err(SessionError::transfer)?;
        tracing::info!(operation_id = %ctx.id, signature = %signature, "Transfer submitted");
        self.events.publish(SessionEvent::TransferSubmitted {
            operation_id: ctx.id,
            signature,
        });

        rpc.confirm_transaction(&signature)
            .await
            .map_err(SessionError::transfer)?;
        tracing::info!(
            operation_id = %ctx.id,
            signature = %signature,
            commitment = %rpc.commitment(),
            "Transfer confirmed"
        );
        self.events.publish(SessionEvent::TransferConfirmed {
            operation_id: ctx.id,
            signature,
        });

        if let Err(e) = self.refresh_inner(ctx.id).await {
            self.record_failure(ctx.id, Operation::RefreshBalance, &e);
        }
        Ok(signature)
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("wallet", &self.wallet.name())
            .field("rpc", &self.rpc().map(|r| r.endpoint().to_string()))
            .field("state", &self.state())
            .finish()
    }
}
