//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, endpoint scheme)
//!
//! Returns all validation errors, not just the first.

use thiserror::Error;

use crate::config::schema::WalletConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rpc.endpoint '{0}' must be an http(s) URL")]
    InvalidEndpoint(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("rpc.poll_interval_ms ({poll_ms}) must be shorter than rpc.confirm_timeout_secs ({confirm_secs}s)")]
    PollIntervalTooLong { poll_ms: u64, confirm_secs: u64 },

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let rpc = &config.rpc;

    match url::Url::parse(&rpc.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidEndpoint(rpc.endpoint.clone())),
    }

    if rpc.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("rpc.timeout_secs"));
    }
    if rpc.confirm_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("rpc.confirm_timeout_secs"));
    }
    if rpc.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroValue("rpc.poll_interval_ms"));
    } else if rpc.confirm_timeout_secs > 0
        && rpc.poll_interval_ms >= rpc.confirm_timeout_secs.saturating_mul(1000)
    {
        errors.push(ValidationError::PollIntervalTooLong {
            poll_ms: rpc.poll_interval_ms,
            confirm_secs: rpc.confirm_timeout_secs,
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
