//! Exponential backoff.

use std::time::Duration;

use crate::config::RetryPolicy;

/// Delay before the given retry (1 = first retry).
///
/// `min(base * multiplier^(retry-1), max)`. Retry 0 is the initial attempt and
/// never waits. No jitter is applied so successive delays never decrease.
pub fn calculate_backoff(retry: u32, policy: &RetryPolicy) -> Duration {
    if retry == 0 {
        return Duration::from_millis(0);
    }

    let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
    let factor = policy.backoff_multiplier.max(1.0).powi(exponent);
    let delay_ms = (policy.base_delay_ms as f64 * factor).min(policy.max_delay_ms as f64);

    // f64 -> u64 saturates; NaN maps to 0
    Duration::from_millis(delay_ms as u64)
}

/// Every delay the policy would apply, in order.
pub fn delay_schedule(policy: &RetryPolicy) -> Vec<Duration> {
    (1..=policy.max_retries)
        .map(|retry| calculate_backoff(retry, policy))
        .collect()
}
