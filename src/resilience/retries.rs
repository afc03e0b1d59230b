//! Retry execution.
//!
//! # Responsibilities
//! - Gate every attempt on the circuit breaker
//! - Execute retries with exponential backoff
//! - Classify failures and stop early on non-transient ones
//! - Report every attempt outcome to the health tracker
//!
//! # Design Decisions
//! - Total attempts never exceed `max_retries + 1`
//! - Non-retryable failures surface immediately, without delay
//! - Backoff suspends only the calling task (`tokio::time::sleep`)

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::RetryPolicy;
use crate::error::{GatewayError, RemoteError};
use crate::health::ConnectionHealthTracker;
use crate::observability::metrics;
use crate::observability::telemetry::{emit, TelemetryEvent, TelemetrySink};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::classifier::classify;

/// Identifies one logical remote operation across its attempts.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: String,
    pub request_id: Uuid,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            request_id: Uuid::new_v4(),
        }
    }
}

/// Successful result plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Wraps remote operations with circuit gating and backoff retries.
#[derive(Clone)]
pub struct RetryExecutor {
    health: Arc<ConnectionHealthTracker>,
    policy: Arc<ArcSwap<RetryPolicy>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl RetryExecutor {
    pub fn new(
        health: Arc<ConnectionHealthTracker>,
        policy: RetryPolicy,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            health,
            policy: Arc::new(ArcSwap::from_pointee(policy)),
            telemetry,
        }
    }

    /// Current default policy.
    pub fn policy(&self) -> Arc<RetryPolicy> {
        self.policy.load_full()
    }

    /// Replace the default policy for subsequent operations.
    pub fn set_policy(&self, policy: RetryPolicy) {
        self.policy.store(Arc::new(policy));
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of retries.
    pub async fn execute_with_retry<F, Fut, T>(
        &self,
        mut operation: F,
        context: &OperationContext,
        policy_override: Option<&RetryPolicy>,
    ) -> Result<RetryOutcome<T>, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let default_policy = self.policy();
        let policy = policy_override.unwrap_or(default_policy.as_ref());
        let mut attempts: u32 = 0;

        loop {
            if self.health.is_circuit_open() {
                let retry_after_secs = self
                    .health
                    .retry_after()
                    .map(|d| d.as_secs_f64().ceil() as u64)
                    .unwrap_or(0);
                tracing::warn!(
                    operation = %context.operation,
                    request_id = %context.request_id,
                    attempts,
                    retry_after_secs,
                    "Circuit open, failing fast"
                );
                emit(
                    self.telemetry.as_ref(),
                    TelemetryEvent::new("circuit_rejected")
                        .with("operation", &context.operation)
                        .with("attempts", attempts),
                );
                return Err(GatewayError::ServiceUnavailable { retry_after_secs });
            }

            attempts += 1;
            match operation().await {
                Ok(value) => {
                    self.health.record_success();
                    if attempts > 1 {
                        tracing::info!(
                            operation = %context.operation,
                            request_id = %context.request_id,
                            attempts,
                            "Operation succeeded after retries"
                        );
                    }
                    metrics::record_attempts(&context.operation, attempts);
                    return Ok(RetryOutcome { value, attempts });
                }
                Err(error) => {
                    self.health.record_failure();
                    let classification = classify(&error);

                    if !classification.retryable {
                        tracing::warn!(
                            operation = %context.operation,
                            request_id = %context.request_id,
                            attempts,
                            category = %classification.category,
                            error = %error,
                            "Non-retryable error"
                        );
                        emit(
                            self.telemetry.as_ref(),
                            TelemetryEvent::new("non_retryable_error")
                                .with("operation", &context.operation)
                                .with("category", classification.category),
                        );
                        metrics::record_attempts(&context.operation, attempts);
                        return Err(GatewayError::Remote {
                            category: classification.category,
                            attempts,
                            error,
                        });
                    }

                    let retries_done = attempts - 1;
                    if retries_done >= policy.max_retries {
                        tracing::error!(
                            operation = %context.operation,
                            request_id = %context.request_id,
                            attempts,
                            category = %classification.category,
                            error = %error,
                            "Retries exhausted"
                        );
                        emit(
                            self.telemetry.as_ref(),
                            TelemetryEvent::new("retry_exhausted")
                                .with("operation", &context.operation)
                                .with("category", classification.category)
                                .with("attempts", attempts),
                        );
                        metrics::record_attempts(&context.operation, attempts);
                        return Err(GatewayError::RetryExhausted {
                            operation: context.operation.clone(),
                            attempts,
                            last_error: error,
                        });
                    }

                    let delay = calculate_backoff(attempts, policy);
                    tracing::warn!(
                        operation = %context.operation,
                        request_id = %context.request_id,
                        attempt = attempts,
                        category = %classification.category,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    emit(
                        self.telemetry.as_ref(),
                        TelemetryEvent::new("retry_attempt_failed")
                            .with("operation", &context.operation)
                            .with("category", classification.category)
                            .with("attempt", attempts),
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::telemetry::MemoryTelemetry;
    use crate::resilience::circuit_breaker::{BreakerSettings, CircuitState};
    use crate::resilience::classifier::ErrorCategory;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn executor() -> (RetryExecutor, Arc<ConnectionHealthTracker>, Arc<MemoryTelemetry>) {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let health = Arc::new(ConnectionHealthTracker::new(
            BreakerSettings::default(),
            telemetry.clone(),
        ));
        let executor = RetryExecutor::new(health.clone(), RetryPolicy::default(), telemetry.clone());
        (executor, health, telemetry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_resets() {
        let (executor, health, _) = executor();
        let calls = AtomicU32::new(0);
        let ctx = OperationContext::new("documents.get");

        let outcome = executor
            .execute_with_retry(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(RemoteError::transport("ECONNRESET", "connection reset by peer"))
                        } else {
                            Ok("doc")
                        }
                    }
                },
                &ctx,
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome, RetryOutcome { value: "doc", attempts: 3 });
        let counters = health.counters();
        assert_eq!(counters.consecutive_failures, 0);
        assert_eq!(counters.total_failures, 2);
        assert_eq!(counters.total_successes, 1);
        assert_eq!(counters.total_requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_bounded_and_delays_non_decreasing() {
        let (executor, _, telemetry) = executor();
        let stamps = Mutex::new(Vec::new());
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay_ms: 1000,
            max_delay_ms: 3000,
            backoff_multiplier: 2.0,
        };

        let err = executor
            .execute_with_retry(
                || {
                    stamps.lock().unwrap().push(Instant::now());
                    async { Err::<(), _>(RemoteError::status(503, "service unavailable")) }
                },
                &OperationContext::new("account.get"),
                Some(&policy),
            )
            .await
            .unwrap_err();

        match err {
            GatewayError::RetryExhausted { attempts, ref last_error, .. } => {
                assert_eq!(attempts, 5);
                assert_eq!(last_error.http_status, Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 5);
        let delays: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(3000),
                Duration::from_millis(3000),
            ]
        );
        assert_eq!(telemetry.count("retry_exhausted"), 1);
        assert_eq!(telemetry.count("retry_attempt_failed"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let (executor, health, _) = executor();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let err = executor
            .execute_with_retry(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(RemoteError::status(401, "connection reset")) }
                },
                &OperationContext::new("account.get"),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(Instant::now(), started);
        assert!(matches!(err, GatewayError::Remote { category: ErrorCategory::Auth, attempts: 1, .. }));
        assert_eq!(health.counters().total_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast_without_invoking() {
        let (executor, health, _) = executor();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay_ms: 10,
            ..RetryPolicy::default()
        };
        let refused = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(RemoteError::transport("ECONNREFUSED", "connection refused")) }
        };

        let err = executor
            .execute_with_retry(refused, &OperationContext::new("documents.list"), Some(&policy))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RetryExhausted { attempts: 5, .. }));
        assert_eq!(health.circuit_state(), CircuitState::Open);
        let before = health.counters();

        tokio::time::advance(Duration::from_secs(60)).await;
        let err = executor
            .execute_with_retry(refused, &OperationContext::new("documents.list"), Some(&policy))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::ServiceUnavailable { retry_after_secs: 60 }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(health.counters(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opening_mid_loop_stops_retrying() {
        let (executor, health, _) = executor();
        let calls = AtomicU32::new(0);
        for _ in 0..4 {
            health.record_failure();
        }

        let err = executor
            .execute_with_retry(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(RemoteError::transport("ETIMEDOUT", "request timed out")) }
                },
                &OperationContext::new("documents.create"),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, GatewayError::ServiceUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_hot_swap() {
        let (executor, _, _) = executor();
        executor.set_policy(RetryPolicy { max_retries: 0, ..RetryPolicy::default() });
        let calls = AtomicU32::new(0);

        let err = executor
            .execute_with_retry(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(RemoteError::message("fetch failed")) }
                },
                &OperationContext::new("account.get"),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, GatewayError::RetryExhausted { attempts: 1, .. }));
    }
}
