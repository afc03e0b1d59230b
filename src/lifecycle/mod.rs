//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! signals.rs: SIGTERM / Ctrl-C → Shutdown::trigger
//! shutdown.rs: broadcast → cache sweeper, cooldown timer, config watcher,
//!              admin server exit → drain with deadline
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
