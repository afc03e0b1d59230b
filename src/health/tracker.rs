//! Connection health tracking and circuit gating.
//!
//! # Responsibilities
//! - Record every remote-call outcome reported by the retry executor
//! - Drive the circuit breaker from the failure streak and health score
//! - Run the cooldown timer that moves an open circuit to half-open
//! - Produce network health snapshots on demand
//!
//! # Design Decisions
//! - Counters and breaker share one mutex so every transition decision sees
//!   the counters it was computed from
//! - Transitions are logged and emitted after the lock is released
//! - `is_circuit_open` also applies an elapsed cooldown, so recovery does not
//!   depend on the timer task running

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::health::state::{ConnectionHealthState, HealthStatus};
use crate::observability::metrics;
use crate::observability::telemetry::{emit, TelemetryEvent, TelemetrySink};
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState, Transition};

struct TrackerInner {
    health: ConnectionHealthState,
    breaker: CircuitBreaker,
}

/// Circuit section of a health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub secs_in_state: u64,
    pub half_open_successes: u32,
    pub retry_after_secs: Option<u64>,
}

/// Point-in-time view of the remote connection.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkHealth {
    pub score: u8,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub failure_rate: f64,
    pub secs_since_last_success: Option<u64>,
    pub secs_since_last_failure: Option<u64>,
    pub circuit: CircuitSnapshot,
}

/// Shared health state for the remote service.
pub struct ConnectionHealthTracker {
    inner: Mutex<TrackerInner>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ConnectionHealthTracker {
    pub fn new(settings: BreakerSettings, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                health: ConnectionHealthState::default(),
                breaker: CircuitBreaker::new(settings, Instant::now()),
            }),
            telemetry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successful remote call.
    pub fn record_success(&self) {
        let now = Instant::now();
        let (transition, score) = {
            let mut inner = self.lock();
            inner.health.record_success(now);
            let transition = inner.breaker.on_success(now);
            (transition, inner.health.score(now))
        };
        metrics::record_health_score(score);
        self.announce(transition, score);
    }

    /// Record a failed remote call.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let (transition, score) = {
            let mut inner = self.lock();
            inner.health.record_failure(now);
            let score = inner.health.score(now);
            let streak = inner.health.consecutive_failures;
            let transition = inner.breaker.on_failure(streak, score, now);
            (transition, score)
        };
        metrics::record_health_score(score);
        self.announce(transition, score);
    }

    /// Whether calls must currently fail fast.
    pub fn is_circuit_open(&self) -> bool {
        self.poll_cooldown();
        self.lock().breaker.is_open()
    }

    /// Time until an open circuit may be tried again.
    pub fn retry_after(&self) -> Option<Duration> {
        self.lock().breaker.cooldown_remaining(Instant::now())
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.lock().breaker.state()
    }

    /// Copy of the raw counters.
    pub fn counters(&self) -> ConnectionHealthState {
        self.lock().health.clone()
    }

    pub fn score(&self) -> u8 {
        self.lock().health.score(Instant::now())
    }

    /// Apply an elapsed cooldown (open → half-open).
    pub fn poll_cooldown(&self) {
        let now = Instant::now();
        let (transition, score) = {
            let mut inner = self.lock();
            let transition = inner.breaker.poll_cooldown(now);
            (transition, inner.health.score(now))
        };
        self.announce(transition, score);
    }

    /// Replace breaker thresholds, keeping state and counters.
    pub fn update_settings(&self, settings: BreakerSettings) {
        self.lock().breaker.set_settings(settings);
    }

    /// Operator reset: counters and breaker back to their initial values.
    pub fn reset(&self) {
        let now = Instant::now();
        let (transition, score) = {
            let mut inner = self.lock();
            inner.health = ConnectionHealthState::default();
            let transition = inner.breaker.reset(now);
            (transition, inner.health.score(now))
        };
        tracing::info!("Connection health state reset");
        self.announce(transition, score);
    }

    /// Snapshot of counters, score and circuit state.
    pub fn get_network_health(&self) -> NetworkHealth {
        self.poll_cooldown();
        let now = Instant::now();
        let inner = self.lock();
        let health = &inner.health;
        let breaker = inner.breaker.snapshot();
        let score = health.score(now);
        let secs_since = |at: Option<Instant>| at.map(|t| now.saturating_duration_since(t).as_secs());

        NetworkHealth {
            score,
            status: HealthStatus::from_score(score),
            consecutive_failures: health.consecutive_failures,
            total_requests: health.total_requests,
            total_successes: health.total_successes,
            total_failures: health.total_failures,
            failure_rate: health.failure_rate(),
            secs_since_last_success: secs_since(health.last_success_at),
            secs_since_last_failure: secs_since(health.last_failure_at),
            circuit: CircuitSnapshot {
                state: breaker.state,
                secs_in_state: now.saturating_duration_since(breaker.last_transition_at).as_secs(),
                half_open_successes: breaker.consecutive_successes_since_half_open,
                retry_after_secs: inner
                    .breaker
                    .cooldown_remaining(now)
                    .map(|d| d.as_secs_f64().ceil() as u64),
            },
        }
    }

    /// Cooldown timer: ticks until shutdown, moving open circuits to half-open.
    pub async fn run_cooldown_timer(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Circuit cooldown timer starting");
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll_cooldown(),
                _ = shutdown.recv() => {
                    tracing::info!("Circuit cooldown timer received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn announce(&self, transition: Option<Transition>, score: u8) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        match to {
            CircuitState::Open => {
                tracing::warn!(from = %from, to = %to, score, "Circuit breaker opened")
            }
            _ => tracing::info!(from = %from, to = %to, score, "Circuit breaker transition"),
        }
        metrics::record_circuit_state(to);
        emit(
            self.telemetry.as_ref(),
            TelemetryEvent::new("circuit_transition")
                .with("from", from)
                .with("to", to)
                .with("score", score),
        );
    }
}
