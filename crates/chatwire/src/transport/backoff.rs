//! Reconnection configuration and exponential backoff.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect, and after every successful open.
    pub base_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Doubling backoff with a cap and no retry limit.
///
/// The delay handed out by [`Backoff::next_delay`] is the one current
/// before the call; the doubling only affects the following failure.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// Create a backoff starting at the base delay.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            current: config.base_delay,
            attempts: 0,
        }
    }

    /// Delay that the next failure will wait.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Failures since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .saturating_mul(2)
            .min(self.config.max_delay);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Back to the base delay.
    pub fn reset(&mut self) {
        self.current = self.config.base_delay;
        self.attempts = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_delay, Duration::from_millis(3000));
        assert_eq!(config.max_delay, Duration::from_millis(30000));
    }

    #[test]
    fn test_three_failures_wait_3_6_12_seconds() {
        let mut backoff = Backoff::default();
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(), Duration::from_secs(6));
        assert_eq!(backoff.next_delay(), Duration::from_secs(12));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_delay_is_capped() {
        let mut backoff = Backoff::default();
        let delays: Vec<_> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            [3, 6, 12, 24, 30, 30, 30, 30].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_delays_never_decrease() {
        let mut backoff = Backoff::new(ReconnectConfig {
            base_delay: Duration::from_millis(7),
            max_delay: Duration::from_millis(500),
        });
        let mut previous = Duration::ZERO;
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= Duration::from_millis(500));
            previous = delay;
        }
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current(), Duration::from_secs(12));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(3));
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_base_above_max_is_capped_after_first() {
        let mut backoff = Backoff::new(ReconnectConfig {
            base_delay: Duration::from_secs(40),
            max_delay: Duration::from_secs(30),
        });
        assert_eq!(backoff.next_delay(), Duration::from_secs(40));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }
}
