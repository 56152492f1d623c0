//! Reconnection backoff policy.

use std::time::Duration;

use crewdeck_core::config::realtime::RealtimeConfig;

/// Deterministic backoff schedule: attempt N waits N times the base delay,
/// up to a fixed attempt cap. No jitter.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    base: Duration,
    max_attempts: u32,
}

impl BackoffSchedule {
    /// Creates a schedule from a base delay and attempt cap.
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    /// Builds the schedule from client configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_base_delay_ms),
            config.reconnect_max_attempts,
        )
    }

    /// Delay before the given attempt (attempts are numbered from 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base * attempt.max(1)
    }

    /// Maximum number of consecutive attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_scales_linearly_with_attempt() {
        let schedule = BackoffSchedule::new(Duration::from_millis(100), 5);
        assert_eq!(schedule.delay_for(1), Duration::from_millis(100));
        assert_eq!(schedule.delay_for(3), Duration::from_millis(300));
        assert_eq!(schedule.delay_for(5), Duration::from_millis(500));
    }

    #[test]
    fn test_attempt_zero_is_clamped() {
        let schedule = BackoffSchedule::new(Duration::from_millis(100), 5);
        assert_eq!(schedule.delay_for(0), Duration::from_millis(100));
    }

    #[test]
    fn test_from_config() {
        let config = RealtimeConfig::for_endpoint("http://localhost:4000");
        let schedule = BackoffSchedule::from_config(&config);
        assert_eq!(schedule.max_attempts(), 5);
        assert_eq!(schedule.delay_for(1), Duration::from_millis(1000));
    }
}
