//! RpcClient against a programmable JSON-RPC backend.

mod common;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::{rpc_error, rpc_result, start_rpc_backend};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wallet_session::blockchain::types::{BlockchainError, Commitment, Hash, Pubkey, Signature};
use wallet_session::blockchain::{system_transfer, RpcClient, RpcConnection, Transaction};
use wallet_session::config::RpcConfig;

fn client_for(addr: SocketAddr) -> RpcClient {
    RpcClient::new(RpcConfig {
        endpoint: format!("http://{}", addr),
        commitment: Commitment::Confirmed,
        timeout_secs: 2,
        confirm_timeout_secs: 2,
        poll_interval_ms: 20,
        system_proxy: false,
    })
    .unwrap()
}

/// Backend that records every request and answers each with `result`.
async fn recording_backend(result: Value) -> (SocketAddr, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let addr = start_rpc_backend(move |req: Value| {
        let log = log.clone();
        let result = result.clone();
        async move {
            log.lock().unwrap().push(req.clone());
            (200, rpc_result(&req, result))
        }
    })
    .await;
    (addr, seen)
}

#[tokio::test]
async fn test_get_balance() {
    let (addr, seen) =
        recording_backend(json!({ "context": { "slot": 12 }, "value": 1_500_000_000u64 })).await;
    let client = client_for(addr);
    let address = Pubkey([7u8; 32]);

    let lamports = client.get_balance(&address).await.unwrap();
    assert_eq!(lamports, 1_500_000_000);

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["jsonrpc"], "2.0");
    assert_eq!(requests[0]["method"], "getBalance");
    assert_eq!(requests[0]["params"][0], address.to_string());
    assert_eq!(requests[0]["params"][1]["commitment"], "confirmed");
}

#[tokio::test]
async fn test_get_latest_blockhash() {
    let blockhash = Hash([9u8; 32]);
    let (addr, _) = recording_backend(json!({
        "context": { "slot": 3 },
        "value": { "blockhash": blockhash.to_string(), "lastValidBlockHeight": 150 }
    }))
    .await;

    let client = client_for(addr);
    assert_eq!(client.get_latest_blockhash().await.unwrap(), blockhash);
}

#[tokio::test]
async fn test_send_transaction_encodes_base64() {
    let signature = Signature([5u8; 64]);
    let (addr, seen) = recording_backend(json!(signature.to_string())).await;
    let client = client_for(addr);

    let tx = system_transfer(&Pubkey([1u8; 32]), &Pubkey([2u8; 32]), 1_000, Hash([3u8; 32]));
    let raw = tx.serialize().unwrap();
    assert_eq!(client.send_raw_transaction(&raw).await.unwrap(), signature);

    let requests = seen.lock().unwrap();
    assert_eq!(requests[0]["method"], "sendTransaction");
    assert_eq!(requests[0]["params"][1]["encoding"], "base64");
    let sent = BASE64
        .decode(requests[0]["params"][0].as_str().unwrap())
        .unwrap();
    assert_eq!(Transaction::deserialize(&sent).unwrap(), tx);
}

#[tokio::test]
async fn test_rpc_error_object() {
    let addr = start_rpc_backend(|req: Value| async move {
        (200, rpc_error(&req, -32602, "Invalid param: WrongSize"))
    })
    .await;
    let client = client_for(addr);

    match client.get_balance(&Pubkey::default()).await {
        Err(BlockchainError::RpcResponse { code, message }) => {
            assert_eq!(code, -32602);
            assert!(message.contains("WrongSize"));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_status() {
    let addr = start_rpc_backend(|_req: Value| async move {
        (503, json!({ "message": "node is behind" }))
    })
    .await;
    let client = client_for(addr);

    let err = client.get_balance(&Pubkey::default()).await.unwrap_err();
    assert!(matches!(err, BlockchainError::Rpc(ref msg) if msg.contains("503")));
    assert!(!client.is_healthy().await);
}

#[tokio::test]
async fn test_request_timeout() {
    let addr = start_rpc_backend(|req: Value| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, rpc_result(&req, json!({ "context": { "slot": 1 }, "value": 1 })))
    })
    .await;
    let mut config = client_for(addr).config().clone();
    config.timeout_secs = 1;
    let client = RpcClient::new(config).unwrap();

    let err = client.get_balance(&Pubkey::default()).await.unwrap_err();
    assert!(matches!(err, BlockchainError::Timeout(1)));
}

#[tokio::test]
async fn test_health_check() {
    let (addr, seen) = recording_backend(json!("ok")).await;
    let client = client_for(addr);

    assert!(client.is_healthy().await);
    assert_eq!(seen.lock().unwrap()[0]["method"], "getHealth");
}

/// Backend that reports `pending` polls of "not found" and then `status`.
async fn status_backend(pending: u32, status: Value) -> (SocketAddr, Arc<AtomicU32>) {
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    let addr = start_rpc_backend(move |req: Value| {
        let counter = counter.clone();
        let status = status.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let value = if n < pending { Value::Null } else { status };
            (200, rpc_result(&req, json!({ "context": { "slot": 40 }, "value": [value] })))
        }
    })
    .await;
    (addr, polls)
}

#[tokio::test]
async fn test_confirm_transaction_waits_for_commitment() {
    let (addr, polls) = status_backend(
        2,
        json!({ "slot": 41, "confirmations": 1, "err": null, "confirmationStatus": "confirmed" }),
    )
    .await;
    let client = client_for(addr);

    client.confirm_transaction(&Signature([1u8; 64])).await.unwrap();
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_confirm_transaction_reports_failure() {
    let (addr, _) = status_backend(
        0,
        json!({
            "slot": 41,
            "confirmations": 0,
            "err": { "InstructionError": [0, { "Custom": 1 }] },
            "confirmationStatus": "processed"
        }),
    )
    .await;
    let client = client_for(addr);

    let err = client.confirm_transaction(&Signature([1u8; 64])).await.unwrap_err();
    assert!(matches!(err, BlockchainError::TransactionFailed(ref msg) if msg.contains("InstructionError")));
}

#[tokio::test]
async fn test_confirm_transaction_times_out() {
    let (addr, polls) = status_backend(
        0,
        json!({ "slot": 41, "confirmations": 0, "err": null, "confirmationStatus": "processed" }),
    )
    .await;
    let mut config = client_for(addr).config().clone();
    config.confirm_timeout_secs = 1;
    config.poll_interval_ms = 100;
    let client = RpcClient::new(config).unwrap();

    let err = client.confirm_transaction(&Signature([1u8; 64])).await.unwrap_err();
    assert!(matches!(err, BlockchainError::ConfirmationTimeout(1)));
    assert!(polls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_get_signature_status_not_found() {
    let (addr, _) = status_backend(u32::MAX, Value::Null).await;
    let client = client_for(addr);

    let status = client.get_signature_status(&Signature([1u8; 64])).await.unwrap();
    assert!(status.is_none());
}
