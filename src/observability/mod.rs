//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! session, rpc client, wallet:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (pretty or JSON)
//!     → whatever `metrics` recorder the host installs
//! ```
//!
//! Host applications that want typed notifications subscribe to
//! `session::SessionEvent` instead of parsing logs.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
