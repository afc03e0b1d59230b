//! Telemetry sink.
//!
//! # Responsibilities
//! - Define the fire-and-forget event interface consumed by the gateway
//! - Guarantee sink failures never fail the primary operation
//!
//! # Design Decisions
//! - Sinks return `Result`; [`emit`] logs and swallows the error
//! - `MetricsTelemetry` forwards events to the `metrics` facade
//! - `MemoryTelemetry` keeps events in memory for inspection

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;

/// A single telemetry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub name: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

impl TelemetryEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Error reported by a telemetry sink.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for gateway events.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

/// Send an event, logging and discarding any sink failure.
pub fn emit(sink: &dyn TelemetrySink, event: TelemetryEvent) {
    if let Err(e) = sink.record(&event) {
        tracing::warn!(event = event.name, error = %e, "Telemetry sink rejected event");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Counts events through the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTelemetry;

impl TelemetrySink for MetricsTelemetry {
    fn record(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        match event.field("category") {
            Some(category) => {
                metrics::counter!(
                    "gateway_events_total",
                    "event" => event.name,
                    "category" => category.to_string()
                )
                .increment(1);
            }
            None => {
                metrics::counter!("gateway_events_total", "event" => event.name).increment(1);
            }
        }
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.name == name)
            .count()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn record(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
