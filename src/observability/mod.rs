//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway components produce:
//!     → logging.rs (structured tracing events)
//!     → telemetry.rs (fire-and-forget events, sink errors swallowed)
//!     → metrics.rs (gauges for cache size, health score, circuit state)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use telemetry::{emit, MemoryTelemetry, MetricsTelemetry, NoopTelemetry, TelemetryEvent, TelemetrySink};
