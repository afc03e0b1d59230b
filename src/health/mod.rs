//! Connection health subsystem.
//!
//! # Data Flow
//! ```text
//! Remote call outcome (from the retry executor):
//!     → tracker.rs records success/failure
//!     → state.rs updates counters, score recomputed
//!     → circuit breaker decides on a transition
//!
//! Cooldown timer (tracker.rs):
//!     Periodic tick
//!     → Open circuit older than cooldown → Half-Open
//! ```
//!
//! # Design Decisions
//! - One tracker per gateway context, no process globals
//! - Score is derived on demand from counters, never stored
//! - Counters only reset by explicit operator action

pub mod state;
pub mod tracker;

pub use state::{ConnectionHealthState, HealthStatus};
pub use tracker::{ConnectionHealthTracker, NetworkHealth};
