//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Business operation closure:
//!     → retries.rs checks the circuit gate (fail fast when open)
//!     → attempt the operation
//!     → On failure: classifier.rs decides category and retryability
//!     → backoff.rs computes the delay, only the calling task sleeps
//!     → outcome recorded on the health tracker (drives circuit_breaker.rs)
//! ```
//!
//! # Design Decisions
//! - Auth, permission and not-found failures never retry
//! - A fast-fail on an open circuit is not an observed failure
//! - Delays are deterministic (no jitter) so they never decrease

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod retries;

pub use classifier::{classify, Classification, ErrorCategory};
pub use retries::{OperationContext, RetryExecutor, RetryOutcome};
