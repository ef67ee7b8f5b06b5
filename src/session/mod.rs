//! Wallet session subsystem.
//!
//! # Data Flow
//! ```text
//! host calls connect / disconnect / refresh_balance / send_test_transfer
//!     → manager.rs (in-flight guard, validation, orchestration)
//!     → WalletAdapter / RpcConnection (injected)
//!     → state.rs (new SessionState snapshot, published via ArcSwap)
//!     → events.rs (SessionEvent broadcast to subscribers)
//! ```
//!
//! # Design Decisions
//! - Collaborators are passed in, never global
//! - Failures are recovered at the operation boundary: `last_error` is set,
//!   an event is published, and the error is returned
//! - No retries; a failed network call surfaces once

pub mod error;
pub mod events;
pub mod manager;
pub mod state;

pub use error::SessionError;
pub use events::{EventBus, Operation, SessionEvent};
pub use manager::WalletSession;
pub use state::{ConnectionStatus, SessionState};
