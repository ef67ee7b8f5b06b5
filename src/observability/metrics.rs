//! Metrics collection.
//!
//! # Metrics
//! - `wallet_session_operations_total` (counter): operations by name, outcome
//! - `wallet_session_operation_duration_seconds` (histogram): operation latency
//! - `wallet_session_balance_lamports` (gauge): last fetched balance
//! - `wallet_rpc_requests_total` (counter): RPC calls by method, outcome
//! - `wallet_rpc_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host installs a recorder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static ENABLED: AtomicBool = AtomicBool::new(true);

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

/// Record a finished session operation.
pub fn record_operation(operation: &'static str, ok: bool, elapsed: Duration) {
    if !enabled() {
        return;
    }
    ::metrics::counter!(
        "wallet_session_operations_total",
        "operation" => operation,
        "outcome" => outcome(ok)
    )
    .increment(1);
    ::metrics::histogram!(
        "wallet_session_operation_duration_seconds",
        "operation" => operation
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_balance(lamports: u64) {
    if enabled() {
        ::metrics::gauge!("wallet_session_balance_lamports").set(lamports as f64);
    }
}

pub fn record_rpc_request(method: &'static str, ok: bool) {
    if enabled() {
        ::metrics::counter!(
            "wallet_rpc_requests_total",
            "method" => method,
            "outcome" => outcome(ok)
        )
        .increment(1);
    }
}

pub fn record_rpc_health(healthy: bool) {
    if enabled() {
        ::metrics::gauge!("wallet_rpc_health").set(if healthy { 1.0 } else { 0.0 });
    }
}
