//! Heartbeat/keepalive timer.
//!
//! While connected the transport sends a `ping` frame on every tick. There is
//! no acknowledgement timeout: a dead peer is detected by the socket closing.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between pings.
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
        }
    }
}

/// A running heartbeat timer. Dropping it stops the heartbeat.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    ticker: Interval,
    beats: u64,
}

impl Heartbeat {
    /// Start a timer whose first tick is one interval from now.
    pub(crate) fn start(config: HeartbeatConfig) -> Self {
        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker, beats: 0 }
    }

    /// Wait for the next tick.
    pub(crate) async fn tick(&mut self) {
        self.ticker.tick().await;
        self.beats += 1;
    }

    /// Ticks so far.
    pub(crate) const fn beats(&self) -> u64 {
        self.beats
    }
}

/// Wait for the next tick of an optional heartbeat; pending forever if none.
pub(crate) async fn next_beat(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat {
        Some(hb) => hb.tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_config_default() {
        assert_eq!(HeartbeatConfig::default().interval, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_first_tick_waits_one_interval() {
        let config = HeartbeatConfig {
            interval: Duration::from_millis(40),
        };
        let started = Instant::now();
        let mut hb = Heartbeat::start(config);

        hb.tick().await;

        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(hb.beats(), 1);
    }

    #[tokio::test]
    async fn test_ticks_repeat() {
        let mut hb = Heartbeat::start(HeartbeatConfig {
            interval: Duration::from_millis(5),
        });
        for _ in 0..3 {
            hb.tick().await;
        }
        assert_eq!(hb.beats(), 3);
    }

    #[tokio::test]
    async fn test_no_heartbeat_never_ticks() {
        let mut none = None;
        let result = tokio::time::timeout(Duration::from_millis(30), next_beat(&mut none)).await;
        assert!(result.is_err());
    }
}
