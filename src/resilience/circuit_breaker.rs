//! Circuit breaker for remote service protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: remote assumed down, requests fail fast
//! - Half-Open: probing whether the remote recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold AND health score < score threshold
//! Open → Half-Open: cooldown elapsed since the open transition
//! Half-Open → Closed: `success_threshold` consecutive successes
//! Half-Open → Open: any failure (cooldown restarts)
//! ```
//!
//! The breaker itself holds no counters beyond its half-open streak; the
//! failure streak and score come from the connection health state and are
//! passed in by the tracker, which owns both under one lock.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        })
    }
}

/// A state change produced by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Thresholds driving the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub score_threshold: u8,
    pub success_threshold: u32,
    pub cooldown: Duration,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            score_threshold: config.score_threshold,
            success_threshold: config.success_threshold,
            cooldown: config.cooldown(),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

/// Breaker state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub last_transition_at: Instant,
    pub consecutive_successes_since_half_open: u32,
}

/// Counter-driven circuit breaker state machine.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    state: CircuitBreakerState,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings, now: Instant) -> Self {
        Self {
            settings,
            state: CircuitBreakerState {
                state: CircuitState::Closed,
                last_transition_at: now,
                consecutive_successes_since_half_open: 0,
            },
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.state
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        self.state
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Replace thresholds without touching the current state.
    pub fn set_settings(&mut self, settings: BreakerSettings) {
        self.settings = settings;
    }

    pub fn is_open(&self) -> bool {
        self.state.state == CircuitState::Open
    }

    /// Time left before an open circuit may move to half-open.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        if !self.is_open() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.state.last_transition_at);
        Some(self.settings.cooldown.saturating_sub(elapsed))
    }

    /// Observe a successful call.
    pub fn on_success(&mut self, now: Instant) -> Option<Transition> {
        if self.state.state != CircuitState::HalfOpen {
            return None;
        }
        self.state.consecutive_successes_since_half_open += 1;
        if self.state.consecutive_successes_since_half_open >= self.settings.success_threshold {
            return Some(self.transition(CircuitState::Closed, now));
        }
        None
    }

    /// Observe a failed call given the current failure streak and health score.
    pub fn on_failure(
        &mut self,
        consecutive_failures: u32,
        score: u8,
        now: Instant,
    ) -> Option<Transition> {
        match self.state.state {
            CircuitState::Closed => {
                if consecutive_failures >= self.settings.failure_threshold
                    && score < self.settings.score_threshold
                {
                    Some(self.transition(CircuitState::Open, now))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => Some(self.transition(CircuitState::Open, now)),
            CircuitState::Open => None,
        }
    }

    /// Timer hook: move an open circuit to half-open once the cooldown elapsed.
    pub fn poll_cooldown(&mut self, now: Instant) -> Option<Transition> {
        match self.cooldown_remaining(now) {
            Some(remaining) if remaining.is_zero() => {
                Some(self.transition(CircuitState::HalfOpen, now))
            }
            _ => None,
        }
    }

    /// Back to closed, as if freshly constructed.
    pub fn reset(&mut self, now: Instant) -> Option<Transition> {
        let from = self.state.state;
        self.state = CircuitBreakerState {
            state: CircuitState::Closed,
            last_transition_at: now,
            consecutive_successes_since_half_open: 0,
        };
        (from != CircuitState::Closed).then_some(Transition {
            from,
            to: CircuitState::Closed,
        })
    }

    fn transition(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state.state;
        self.state.state = to;
        self.state.last_transition_at = now;
        self.state.consecutive_successes_since_half_open = 0;
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> (CircuitBreaker, Instant) {
        let now = Instant::now();
        (CircuitBreaker::new(BreakerSettings::default(), now), now)
    }

    #[test]
    fn test_opens_only_with_streak_and_low_score() {
        let (mut cb, now) = breaker();
        assert_eq!(cb.on_failure(4, 0, now), None);
        assert_eq!(cb.on_failure(5, 30, now), None);
        assert_eq!(cb.state(), CircuitState::Closed);

        let t = cb.on_failure(5, 29, now).unwrap();
        assert_eq!(t, Transition { from: CircuitState::Closed, to: CircuitState::Open });
        assert!(cb.is_open());
        assert_eq!(cb.on_failure(9, 0, now), None);
    }

    #[test]
    fn test_half_open_after_cooldown_only() {
        let (mut cb, now) = breaker();
        cb.on_failure(5, 0, now);

        assert_eq!(cb.poll_cooldown(now + Duration::from_secs(60)), None);
        assert_eq!(cb.cooldown_remaining(now + Duration::from_secs(60)), Some(Duration::from_secs(60)));
        assert!(cb.is_open());

        let t = cb.poll_cooldown(now + Duration::from_secs(120)).unwrap();
        assert_eq!(t.to, CircuitState::HalfOpen);
        assert_eq!(cb.cooldown_remaining(now + Duration::from_secs(120)), None);
    }

    #[test]
    fn test_half_open_closes_after_three_successes() {
        let (mut cb, now) = breaker();
        cb.on_failure(5, 0, now);
        let later = now + Duration::from_secs(121);
        cb.poll_cooldown(later);

        assert_eq!(cb.on_success(later), None);
        assert_eq!(cb.on_success(later), None);
        let t = cb.on_success(later).unwrap();
        assert_eq!(t, Transition { from: CircuitState::HalfOpen, to: CircuitState::Closed });
    }

    #[test]
    fn test_half_open_failure_reopens_and_restarts_cooldown() {
        let (mut cb, now) = breaker();
        cb.on_failure(5, 0, now);
        let half_open_at = now + Duration::from_secs(120);
        cb.poll_cooldown(half_open_at);
        cb.on_success(half_open_at);

        let reopened_at = half_open_at + Duration::from_secs(5);
        let t = cb.on_failure(1, 90, reopened_at).unwrap();
        assert_eq!(t.to, CircuitState::Open);
        assert_eq!(cb.poll_cooldown(reopened_at + Duration::from_secs(119)), None);
        assert!(cb.poll_cooldown(reopened_at + Duration::from_secs(120)).is_some());
        assert_eq!(cb.snapshot().consecutive_successes_since_half_open, 0);
    }

    #[test]
    fn test_success_while_closed_is_noop() {
        let (mut cb, now) = breaker();
        assert_eq!(cb.on_success(now), None);
        assert_eq!(cb.reset(now), None);
        cb.on_failure(5, 0, now);
        assert!(cb.reset(now).is_some());
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
