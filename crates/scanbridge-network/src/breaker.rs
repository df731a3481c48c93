//! Consecutive-failure circuit breaker.
//!
//! Counts failed delivery attempts in a row. Reaching the threshold opens
//! the circuit for a fixed cool-down; only [`CircuitBreaker::close`] after
//! the cool-down, or a success, clears the count. The breaker is plain data
//! with the clock passed in, so the sender decides how to wait.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    Closed,
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.opened_at.is_some() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a failed attempt. Returns `true` if this failure opened the circuit.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.opened_at.is_none() && self.consecutive_failures >= self.threshold {
            self.opened_at = Some(now);
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Time left before the open circuit may close. `None` when closed.
    pub fn remaining_cooldown(&self, now: Instant) -> Option<Duration> {
        let opened_at = self.opened_at?;
        Some(self.cooldown.saturating_sub(now.saturating_duration_since(opened_at)))
    }

    /// Close the circuit once its cool-down has elapsed.
    ///
    /// Returns `false` and changes nothing while the cool-down is running.
    pub fn close(&mut self, now: Instant) -> bool {
        match self.remaining_cooldown(now) {
            Some(left) if left.is_zero() => {
                self.opened_at = None;
                self.consecutive_failures = 0;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[test]
    fn test_opens_at_threshold() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, COOLDOWN);

        assert!(!breaker.record_failure(now));
        assert!(!breaker.record_failure(now));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.record_failure(now));
        assert_eq!(breaker.state(), CircuitState::Open);

        // Further failures while open do not re-open
        assert!(!breaker.record_failure(now));
    }

    #[test]
    fn test_success_resets_count() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, COOLDOWN);
        breaker.record_failure(now);
        breaker.record_failure(now);
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);

        assert!(!breaker.record_failure(now));
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_close_only_after_cooldown() {
        let opened = Instant::now();
        let mut breaker = CircuitBreaker::new(1, COOLDOWN);
        assert!(breaker.record_failure(opened));

        let halfway = opened + Duration::from_secs(30);
        assert_eq!(breaker.remaining_cooldown(halfway), Some(Duration::from_secs(30)));
        assert!(!breaker.close(halfway));
        assert!(breaker.is_open());

        let elapsed = opened + COOLDOWN;
        assert_eq!(breaker.remaining_cooldown(elapsed), Some(Duration::ZERO));
        assert!(breaker.close(elapsed));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.remaining_cooldown(elapsed), None);
    }

    #[test]
    fn test_zero_threshold_is_one() {
        let mut breaker = CircuitBreaker::new(0, COOLDOWN);
        assert!(breaker.record_failure(Instant::now()));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Open.to_string(), "open");
        assert_eq!(CircuitState::Closed.to_string(), "closed");
    }
}
