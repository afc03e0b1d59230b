//! Gateway context.
//!
//! # Responsibilities
//! - Own every shared component: client cache, health tracker, retry
//!   executor, token analyzer and telemetry sink
//! - Start and stop the background tasks those components own
//! - Apply hot-reloaded configuration
//! - Offer the authenticated call path: validate → handle → retry
//!
//! # Design Decisions
//! - Built once at startup and passed by `Arc`; there is no global state
//! - Refuses a configuration that fails validation, whatever its source
//! - Only the retry policy and breaker thresholds change on reload

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::HeaderMap;
use tokio::task::JoinHandle;

use crate::client::{CacheSettings, ClientCache, ClientHandle, Credential};
use crate::config::validation::validate_config;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult, RemoteError};
use crate::health::ConnectionHealthTracker;
use crate::lifecycle::Shutdown;
use crate::observability::telemetry::TelemetrySink;
use crate::resilience::circuit_breaker::BreakerSettings;
use crate::resilience::retries::{OperationContext, RetryExecutor, RetryOutcome};
use crate::token::claims::ClaimsPolicy;
use crate::token::{ExtractedCredential, TokenHealthAnalyzer};

/// Shared state for one gateway process.
pub struct GatewayContext {
    config: ArcSwap<GatewayConfig>,
    pub cache: Arc<ClientCache>,
    pub health: Arc<ConnectionHealthTracker>,
    pub retry: RetryExecutor,
    pub tokens: TokenHealthAnalyzer,
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl GatewayContext {
    pub fn new(config: GatewayConfig, telemetry: Arc<dyn TelemetrySink>) -> GatewayResult<Self> {
        validate_config(&config).map_err(|errors| {
            let joined = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            GatewayError::Config(joined)
        })?;

        let cache = Arc::new(ClientCache::new(CacheSettings::from_config(&config)?, telemetry.clone()));
        let health = Arc::new(ConnectionHealthTracker::new(
            BreakerSettings::from(&config.circuit_breaker),
            telemetry.clone(),
        ));
        let retry = RetryExecutor::new(health.clone(), config.retry_policy.clone(), telemetry.clone());
        let tokens = TokenHealthAnalyzer::new(
            ClaimsPolicy::from_config(&config.token, &config.project_id),
            config.token.header_names.clone(),
        );

        Ok(Self {
            config: ArcSwap::from_pointee(config),
            cache,
            health,
            retry,
            tokens,
            telemetry,
        })
    }

    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    /// Spawn the cache sweeper and the circuit cooldown timer.
    pub fn start(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let config = self.config();
        vec![
            tokio::spawn(
                self.cache
                    .clone()
                    .run_sweeper(config.cache_sweep_interval(), shutdown.subscribe()),
            ),
            tokio::spawn(
                self.health
                    .clone()
                    .run_cooldown_timer(config.circuit_breaker.check_interval(), shutdown.subscribe()),
            ),
        ]
    }

    /// Swap in a reloaded configuration.
    pub fn apply_config(&self, new: GatewayConfig) {
        let old = self.config.load_full();
        if old.endpoint != new.endpoint
            || old.project_id != new.project_id
            || old.max_cache_size != new.max_cache_size
            || old.privileged_credential != new.privileged_credential
        {
            tracing::warn!("Endpoint, project, credential and cache sizing changes take effect after restart");
        }

        self.retry.set_policy(new.retry_policy.clone());
        self.health.update_settings(BreakerSettings::from(&new.circuit_breaker));
        tracing::info!(
            max_retries = new.retry_policy.max_retries,
            failure_threshold = new.circuit_breaker.failure_threshold,
            cooldown_secs = new.circuit_breaker.cooldown_secs,
            "Configuration applied"
        );
        self.config.store(Arc::new(new));
    }

    /// Run `operation` against the remote service as the caller's bearer token.
    pub async fn call<F, Fut, T>(
        &self,
        raw_credential: &str,
        operation: &str,
        mut op: F,
    ) -> GatewayResult<RetryOutcome<T>>
    where
        F: FnMut(Arc<ClientHandle>) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let validated = self.tokens.validate(raw_credential)?;
        let handle = self.cache.get_or_build(&Credential::Bearer(validated.token))?;
        let context = OperationContext::new(operation);
        self.retry
            .execute_with_retry(|| op(handle.clone()), &context, None)
            .await
    }

    /// Like [`call`](Self::call), reading the credential from request headers.
    pub async fn call_with_headers<F, Fut, T>(
        &self,
        headers: &HeaderMap,
        operation: &str,
        mut op: F,
    ) -> GatewayResult<(ExtractedCredential, RetryOutcome<T>)>
    where
        F: FnMut(Arc<ClientHandle>) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let extracted = self.tokens.validate_and_extract_credential(headers)?;
        let handle = self.cache.get_or_build(&extracted.credential)?;
        let context = OperationContext::new(operation);
        let outcome = self
            .retry
            .execute_with_retry(|| op(handle.clone()), &context, None)
            .await?;
        Ok((extracted, outcome))
    }

    /// Run `operation` with the privileged handle.
    pub async fn call_privileged<F, Fut, T>(&self, operation: &str, mut op: F) -> GatewayResult<RetryOutcome<T>>
    where
        F: FnMut(Arc<ClientHandle>) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let handle = self.cache.admin_handle()?;
        let context = OperationContext::new(operation);
        self.retry
            .execute_with_retry(|| op(handle.clone()), &context, None)
            .await
    }

    /// Operator reset: clear cached handles and health counters, close the circuit.
    pub fn reset(&self) {
        self.cache.reset();
        self.health.reset();
        tracing::info!("Gateway state reset");
    }
}
