//! Connection health state and scoring.
//!
//! # Score
//! ```text
//! score = 100 − min(consecutive_failures × 20, 80)
//!             − recency penalty   (50 never succeeded, 30 if > 30 min, 10 if > 5 min)
//!             − failure-rate penalty (round(failures / requests × 30))
//! ```
//! Clamped to 0..=100 and recomputed on demand, never stored.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

const STREAK_PENALTY_PER_FAILURE: u32 = 20;
const STREAK_PENALTY_CAP: u32 = 80;
const NEVER_SUCCEEDED_PENALTY: u32 = 50;
const STALE_SUCCESS_PENALTY: u32 = 30;
const AGING_SUCCESS_PENALTY: u32 = 10;
const STALE_AFTER: Duration = Duration::from_secs(30 * 60);
const AGING_AFTER: Duration = Duration::from_secs(5 * 60);
const FAILURE_RATE_WEIGHT: f64 = 30.0;

/// Process-lifetime counters for the remote connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionHealthState {
    pub last_success_at: Option<Instant>,
    pub last_failure_at: Option<Instant>,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
}

impl ConnectionHealthState {
    pub fn record_success(&mut self, now: Instant) {
        self.total_requests += 1;
        self.total_successes += 1;
        self.consecutive_failures = 0;
        self.last_success_at = Some(now);
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.total_requests += 1;
        self.total_failures += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);
    }

    /// Share of observed requests that failed, 0.0 with no traffic.
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.total_failures as f64 / self.total_requests as f64
    }

    /// Health score in 0..=100.
    pub fn score(&self, now: Instant) -> u8 {
        let streak = self
            .consecutive_failures
            .saturating_mul(STREAK_PENALTY_PER_FAILURE)
            .min(STREAK_PENALTY_CAP);

        let recency = match self.last_success_at {
            None => NEVER_SUCCEEDED_PENALTY,
            Some(at) => {
                let idle = now.saturating_duration_since(at);
                if idle > STALE_AFTER {
                    STALE_SUCCESS_PENALTY
                } else if idle > AGING_AFTER {
                    AGING_SUCCESS_PENALTY
                } else {
                    0
                }
            }
        };

        let rate = (self.failure_rate() * FAILURE_RATE_WEIGHT).round() as u32;

        100u32.saturating_sub(streak + recency + rate) as u8
    }
}

/// Coarse status label derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=100 => HealthStatus::Healthy,
            50..=79 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_scores_never_succeeded() {
        let state = ConnectionHealthState::default();
        assert_eq!(state.score(Instant::now()), 50);
        assert_eq!(state.failure_rate(), 0.0);
    }

    #[test]
    fn test_recent_success_is_full_score() {
        let now = Instant::now();
        let mut state = ConnectionHealthState::default();
        state.record_success(now);
        assert_eq!(state.score(now), 100);
        assert_eq!(HealthStatus::from_score(state.score(now)), HealthStatus::Healthy);
    }

    #[test]
    fn test_recency_penalties() {
        let now = Instant::now();
        let mut state = ConnectionHealthState::default();
        state.record_success(now);
        assert_eq!(state.score(now + Duration::from_secs(6 * 60)), 90);
        assert_eq!(state.score(now + Duration::from_secs(31 * 60)), 70);
    }

    #[test]
    fn test_failures_lower_score_and_reset_streak() {
        let now = Instant::now();
        let mut state = ConnectionHealthState::default();
        state.record_success(now);
        state.record_failure(now);
        state.record_failure(now);
        // 100 - 40 - 0 - round(2/3 * 30)
        assert_eq!(state.score(now), 40);

        state.record_success(now);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.total_failures, 2);
        assert_eq!(state.total_successes, 2);
        assert_eq!(state.total_requests, 4);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let now = Instant::now();
        let mut state = ConnectionHealthState::default();
        for _ in 0..5 {
            state.record_failure(now);
        }
        assert_eq!(state.score(now), 0);
        assert_eq!(HealthStatus::from_score(0), HealthStatus::Unhealthy);
    }
}
