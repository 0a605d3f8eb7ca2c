//! Environment-driven configuration for the gateway composition root.
//! Follows `db-pool::DbConfig::from_env`'s convention: every sub-config
//! carries its own `from_env()` plus a `Default` with the documented
//! figures, so nothing is only discoverable by reading the source.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub http_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        }
    }
}

/// Bus wiring, generalized from `social-service`'s `OutboxPublisherConfig`
/// (`backend/social-service/src/workers/outbox_worker.rs`) to cover the
/// gateway's own Kafka-or-degrade decision for both producing and
/// consuming.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub brokers: String,
    pub topic_prefix: String,
    pub kafka_enabled: bool,
    pub fail_on_kafka_unavailable: bool,
    pub noop_warning_interval_secs: u64,
}

impl BusConfig {
    pub fn from_env() -> Self {
        Self {
            brokers: std::env::var("KAFKA_BROKERS").unwrap_or_default(),
            topic_prefix: std::env::var("KAFKA_TOPIC_PREFIX").unwrap_or_else(|_| "hirestream".to_string()),
            kafka_enabled: std::env::var("GATEWAY_USE_KAFKA")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            fail_on_kafka_unavailable: std::env::var("GATEWAY_FAIL_ON_KAFKA_UNAVAILABLE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            noop_warning_interval_secs: std::env::var("GATEWAY_NOOP_WARNING_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}

/// Per-channel bounded concurrency (§5: "email ≈ 5-10; sms ≈ 3-5; push ≈
/// 3-5"), one bulkhead size per async effect pool.
#[derive(Debug, Clone)]
pub struct ChannelsConfig {
    pub email_bulkhead: usize,
    pub sms_bulkhead: usize,
    pub push_bulkhead: usize,
}

impl ChannelsConfig {
    pub fn from_env() -> Self {
        Self {
            email_bulkhead: env_usize("GATEWAY_EMAIL_BULKHEAD", 8),
            sms_bulkhead: env_usize("GATEWAY_SMS_BULKHEAD", 4),
            push_bulkhead: env_usize("GATEWAY_PUSH_BULKHEAD", 4),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub app: AppConfig,
    pub database_url: String,
    pub redis: RedisConfig,
    pub bus: BusConfig,
    pub channels: ChannelsConfig,
    pub outbox: outbox_core::OutboxPublisherConfig,
    pub retry: retry_pipeline::RetryBackoffConfig,
    pub dedup_ttl: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            app: AppConfig::from_env(),
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/hirestream".to_string()),
            redis: RedisConfig::from_env(),
            bus: BusConfig::from_env(),
            channels: ChannelsConfig::from_env(),
            outbox: outbox_core::OutboxPublisherConfig::from_env(),
            retry: retry_pipeline::RetryBackoffConfig::from_env(),
            dedup_ttl: consumer_runtime::DEFAULT_DEDUP_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_defaults_to_documented_port() {
        std::env::remove_var("PORT");
        std::env::remove_var("APP_ENV");
        let config = AppConfig::from_env();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.env, "development");
    }

    #[test]
    fn channels_default_to_the_midpoint_of_their_documented_ranges() {
        std::env::remove_var("GATEWAY_EMAIL_BULKHEAD");
        std::env::remove_var("GATEWAY_SMS_BULKHEAD");
        std::env::remove_var("GATEWAY_PUSH_BULKHEAD");
        let config = ChannelsConfig::from_env();
        assert_eq!(config.email_bulkhead, 8);
        assert_eq!(config.sms_bulkhead, 4);
        assert_eq!(config.push_bulkhead, 4);
    }

    #[test]
    fn bus_config_defaults_to_graceful_degradation() {
        std::env::remove_var("GATEWAY_FAIL_ON_KAFKA_UNAVAILABLE");
        let config = BusConfig::from_env();
        assert!(!config.fail_on_kafka_unavailable);
    }
}
