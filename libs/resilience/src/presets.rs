//! Tuned circuit breaker configs per named dependency kind. Numeric
//! defaults come from the documented contract rather than the generic
//! defaults in [`crate::circuit_breaker::CircuitBreakerConfig::new`].

use crate::circuit_breaker::CircuitBreakerConfig;
use std::time::Duration;

pub fn db_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new("db", Duration::from_secs(30))
}

pub fn cache_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new("cache", Duration::from_secs(15))
}

pub fn email_channel_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new("email", Duration::from_secs(20))
}

pub fn sms_channel_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new("sms", Duration::from_secs(20))
}

pub fn bus_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new("bus", Duration::from_secs(20))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_waits_thirty_seconds_before_a_probe() {
        assert_eq!(db_config().wait_duration_in_open, Duration::from_secs(30));
    }

    #[test]
    fn cache_waits_fifteen_seconds_before_a_probe() {
        assert_eq!(cache_config().wait_duration_in_open, Duration::from_secs(15));
    }

    #[test]
    fn channel_presets_wait_twenty_seconds_before_a_probe() {
        assert_eq!(email_channel_config().wait_duration_in_open, Duration::from_secs(20));
        assert_eq!(sms_channel_config().wait_duration_in_open, Duration::from_secs(20));
        assert_eq!(bus_config().wait_duration_in_open, Duration::from_secs(20));
    }

    #[test]
    fn all_presets_share_the_documented_window_and_threshold() {
        for config in [db_config(), cache_config(), email_channel_config(), sms_channel_config(), bus_config()] {
            assert_eq!(config.window_size, 10);
            assert_eq!(config.failure_rate_threshold, 0.5);
        }
    }
}
