//! Remote service clients.
//!
//! # Data Flow
//! ```text
//! Credential → ClientCache (hit / build + put) → ClientHandle
//!     → DocumentHandle / AccountHandle → reqwest → RemoteError on failure
//! ```

pub mod cache;
pub mod credential;
pub mod handle;

pub use cache::{CacheSettings, CacheStats, ClientCache};
pub use credential::Credential;
pub use handle::{AccountHandle, ClientHandle, ConnectionHandle, DocumentHandle};
