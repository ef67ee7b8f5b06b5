//! Shared fakes for session and RPC integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use wallet_session::blockchain::types::{BlockchainError, BlockchainResult, Commitment, Hash, Pubkey, Signature};
use wallet_session::blockchain::{RpcConnection, Transaction, WalletAdapter};

pub const LAMPORTS: u64 = 1_000_000_000;

/// A scriptable wallet adapter backed by a real ed25519 key.
pub struct FakeWallet {
    signer: SigningKey,
    selected: bool,
    pub fail_connect: AtomicBool,
    pub fail_disconnect: AtomicBool,
    pub skip_signing: AtomicBool,
    connected: AtomicBool,
    gate: Option<Arc<Notify>>,
    disconnect_gate: Option<Arc<Notify>>,
    pub connect_calls: AtomicU32,
    pub sign_calls: AtomicU32,
}

impl FakeWallet {
    pub fn new(seed: u8) -> Self {
        Self {
            signer: SigningKey::from_bytes(&[seed; 32]),
            selected: true,
            fail_connect: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            skip_signing: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            gate: None,
            disconnect_gate: None,
            connect_calls: AtomicU32::new(0),
            sign_calls: AtomicU32::new(0),
        }
    }

    /// No wallet picked by the user.
    pub fn unselected(mut self) -> Self {
        self.selected = false;
        self
    }

    /// `connect` waits until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// `disconnect` waits until the gate is notified.
    pub fn gated_disconnect(mut self, gate: Arc<Notify>) -> Self {
        self.disconnect_gate = Some(gate);
        self
    }

    pub fn address(&self) -> Pubkey {
        Pubkey(self.signer.verifying_key().to_bytes())
    }
}

#[async_trait]
impl WalletAdapter for FakeWallet {
    fn name(&self) -> &str {
        "fake"
    }

    fn selected_wallet(&self) -> Option<String> {
        self.selected.then(|| "fake".to_string())
    }

    async fn connect(&self) -> BlockchainResult<Pubkey> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BlockchainError::Wallet("user rejected the request".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.address())
    }

    async fn disconnect(&self) -> BlockchainResult<()> {
        if let Some(gate) = &self.disconnect_gate {
            gate.notified().await;
        }
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(BlockchainError::Wallet("adapter refused to disconnect".to_string()));
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.connected.load(Ordering::SeqCst).then(|| self.address())
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> BlockchainResult<Transaction> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.skip_signing.load(Ordering::SeqCst) {
            return Ok(tx);
        }
        let message = tx.message_data()?;
        let signature = self.signer.sign(&message);
        tx.add_signature(&self.address(), Signature(signature.to_bytes()))?;
        Ok(tx)
    }
}

/// An in-memory ledger that applies system transfers and charges a fee.
pub struct FakeRpc {
    balances: Mutex<HashMap<Pubkey, u64>>,
    pub fee: u64,
    pub fail_balance: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_confirm: AtomicBool,
    pub balance_calls: AtomicU32,
    pub blockhash_calls: AtomicU32,
    pub send_calls: AtomicU32,
    pub confirm_calls: AtomicU32,
}

impl FakeRpc {
    pub fn new(fee: u64) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            fee,
            fail_balance: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_confirm: AtomicBool::new(false),
            balance_calls: AtomicU32::new(0),
            blockhash_calls: AtomicU32::new(0),
            send_calls: AtomicU32::new(0),
            confirm_calls: AtomicU32::new(0),
        }
    }

    pub fn fund(&self, address: Pubkey, lamports: u64) {
        self.balances.lock().unwrap().insert(address, lamports);
    }

    pub fn balance_of(&self, address: &Pubkey) -> u64 {
        self.balances.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.balance_calls.load(Ordering::SeqCst)
            + self.blockhash_calls.load(Ordering::SeqCst)
            + self.send_calls.load(Ordering::SeqCst)
            + self.confirm_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcConnection for FakeRpc {
    fn endpoint(&self) -> &str {
        "memory://fake"
    }

    fn commitment(&self) -> Commitment {
        Commitment::Confirmed
    }

    async fn get_balance(&self, address: &Pubkey) -> BlockchainResult<u64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(BlockchainError::Rpc("node unavailable".to_string()));
        }
        Ok(self.balance_of(address))
    }

    async fn get_latest_blockhash(&self) -> BlockchainResult<Hash> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Hash([42u8; 32]))
    }

    async fn send_raw_transaction(&self, tx: &[u8]) -> BlockchainResult<Signature> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(BlockchainError::RpcResponse {
                code: -32002,
                message: "Transaction simulation failed".to_string(),
            });
        }

        let tx = Transaction::deserialize(tx)?;
        if !tx.verify() {
            return Err(BlockchainError::RpcResponse {
                code: -32003,
                message: "Transaction signature verification failure".to_string(),
            });
        }
        let (from, to, lamports) = tx
            .system_transfer()
            .ok_or_else(|| BlockchainError::Encoding("not a transfer".to_string()))?;

        let mut balances = self.balances.lock().unwrap();
        let debit = lamports + self.fee;
        let available = balances.get(&from).copied().unwrap_or(0);
        if available < debit {
            return Err(BlockchainError::RpcResponse {
                code: -32002,
                message: "insufficient funds for fee".to_string(),
            });
        }
        balances.insert(from, available - debit);
        *balances.entry(to).or_insert(0) += lamports;

        tx.signature()
            .copied()
            .ok_or_else(|| BlockchainError::Encoding("unsigned".to_string()))
    }

    async fn confirm_transaction(&self, _signature: &Signature) -> BlockchainResult<()> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_confirm.load(Ordering::SeqCst) {
            return Err(BlockchainError::ConfirmationTimeout(60));
        }
        Ok(())
    }
}

/// Start a programmable JSON-RPC backend on an ephemeral port.
///
/// The handler receives the parsed request body and returns the HTTP status
/// and response body.
pub async fn start_rpc_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Value)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(body) = read_request_body(&mut socket).await else {
                            return;
                        };
                        let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                        let (status, response) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let payload = response.to_string();
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            payload.len(),
                            payload
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(buf[header_end..header_end + content_length].to_vec())
}

/// A JSON-RPC success envelope.
pub fn rpc_result(request: &Value, result: Value) -> Value {
    serde_json::json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": result })
}

/// A JSON-RPC error envelope.
pub fn rpc_error(request: &Value, code: i64, message: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": request["id"].clone(),
        "error": { "code": code, "message": message }
    })
}
