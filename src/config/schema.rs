//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the remote document/account service.
    pub endpoint: String,

    /// Project identifier; also the expected token audience.
    pub project_id: String,

    /// Privileged API key used for system-level operations.
    pub privileged_credential: Option<String>,

    /// Maximum number of cached per-credential client handles.
    pub max_cache_size: usize,

    /// Idle time after which a cached handle expires, in seconds.
    pub cache_timeout_secs: u64,

    /// Interval of the background cache sweep, in seconds.
    pub cache_sweep_interval_secs: u64,

    /// Per-request timeout applied by remote handles, in seconds.
    pub request_timeout_secs: u64,

    /// Default retry policy.
    pub retry_policy: RetryPolicy,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Token validation settings.
    pub token: TokenConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8090/v1".to_string(),
            project_id: String::new(),
            privileged_credential: None,
            max_cache_size: 50,
            cache_timeout_secs: 30 * 60,
            cache_sweep_interval_secs: 10 * 60,
            request_timeout_secs: 15,
            retry_policy: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            token: TokenConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Retry policy for remote operations.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for any single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor applied per retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required before the circuit may open.
    pub failure_threshold: u32,

    /// Time the circuit stays open before probing, in seconds.
    pub cooldown_secs: u64,

    /// Health score below which the circuit may open.
    pub score_threshold: u8,

    /// Consecutive half-open successes needed to close the circuit.
    pub success_threshold: u32,

    /// Tick interval of the cooldown timer, in milliseconds.
    pub check_interval_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 120,
            score_threshold: 30,
            success_threshold: 3,
            check_interval_ms: 1000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Bearer token validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Substring the `iss` claim must contain. Empty means the project id.
    pub issuer_marker: String,

    /// Expected `aud` claim. `None` means the project id.
    pub audience: Option<String>,

    /// Tokens expiring sooner than this produce a warning, in seconds.
    pub expiry_warning_secs: u64,

    /// Largest decoded payload accepted, in bytes.
    pub max_payload_bytes: usize,

    /// Headers checked after `Authorization`, in order.
    pub header_names: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer_marker: String::new(),
            audience: None,
            expiry_warning_secs: 300,
            max_payload_bytes: 10 * 1024,
            header_names: vec!["x-auth-token".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Request timeout for admin handlers, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 10,
        }
    }
}
