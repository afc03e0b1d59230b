//! Resilience and trust gateway in front of a remote document/account service.

pub mod admin;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod token;

pub use config::GatewayConfig;
pub use context::GatewayContext;
pub use error::{GatewayError, GatewayResult, RemoteError};
pub use lifecycle::Shutdown;
