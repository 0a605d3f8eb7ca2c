//! Downstream side effects a consumer channel binding can produce (§4.3's
//! "notifications, denormalized counters, stale-cache refresh"):
//! notification dispatch per `ApplicationEvent`, and search-cache
//! invalidation per `JobEvent`.

use async_trait::async_trait;
use cache_layer::{CacheAside, InvalidationBroadcaster};
use consumer_runtime::ConsumerHandler;
use error_handling::CoreError;
use event_contracts::{ApplicationEvent, JobEvent};
use resilience::{CircuitBreaker, ResilienceError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A rendered notification ready for a channel-specific transport.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub user_id: i64,
    pub subject: String,
    pub body: String,
}

/// Channel-specific transport. A real deployment swaps in an SMTP client,
/// an SMS gateway, or APNs/FCM (out of scope for this core, same as the
/// reference workspace's `push_sender.rs`/`fcm_client.rs`); [`LoggingSender`]
/// is the degraded-mode default so the gateway runs without those
/// collaborators configured.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, message: &NotificationMessage) -> Result<(), CoreError>;
}

/// Logs the notification instead of delivering it, mirroring
/// `social-service`'s `NoopPublisher`: an explicit, visible degraded mode
/// rather than a silent stub.
pub struct LoggingSender {
    channel: String,
}

impl LoggingSender {
    pub fn new(channel: impl Into<String>) -> Self {
        Self { channel: channel.into() }
    }
}

#[async_trait]
impl ChannelSender for LoggingSender {
    async fn send(&self, message: &NotificationMessage) -> Result<(), CoreError> {
        info!(
            channel = %self.channel,
            user_id = message.user_id,
            subject = %message.subject,
            "notification dispatched (logging sender)"
        );
        Ok(())
    }
}

/// Decodes `ApplicationEvent` payloads and dispatches a notification
/// through `sender`, wrapped in `breaker` (one of §4.6's channel presets).
/// One instance is bound to one consumer-runtime channel (email, sms, or
/// push).
pub struct NotificationChannelHandler<S: ChannelSender> {
    channel: String,
    sender: S,
    breaker: Arc<CircuitBreaker>,
}

impl<S: ChannelSender> NotificationChannelHandler<S> {
    pub fn new(channel: impl Into<String>, sender: S, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            channel: channel.into(),
            sender,
            breaker,
        }
    }

    fn render(&self, event: &ApplicationEvent) -> NotificationMessage {
        NotificationMessage {
            user_id: event.user_id,
            subject: format!("Application {:?}", event.event_type),
            body: format!("Your application {} is now {}", event.application_id, event.status),
        }
    }
}

#[async_trait]
impl<S: ChannelSender> ConsumerHandler for NotificationChannelHandler<S> {
    async fn handle(&self, payload: &[u8]) -> Result<(), CoreError> {
        let event: ApplicationEvent =
            serde_json::from_slice(payload).map_err(|e| CoreError::Permanent(format!("malformed ApplicationEvent: {e}")))?;
        let message = self.render(&event);

        match self.breaker.call(|| self.sender.send(&message)).await {
            Ok(()) => Ok(()),
            Err(ResilienceError::CircuitOpen { dependency, retry_after_seconds }) => {
                warn!(channel = %self.channel, dependency, retry_after_seconds, "channel circuit open, routing to retry");
                Err(CoreError::Transient(format!("{dependency} circuit open")))
            }
            Err(ResilienceError::Inner(e)) => Err(e),
            Err(other) => Err(CoreError::ServiceUnavailable(other.to_string())),
        }
    }

    fn business_identity(&self, payload: &[u8]) -> Option<(String, String)> {
        let event: ApplicationEvent = serde_json::from_slice(payload).ok()?;
        Some((format!("{}.{:?}", self.channel, event.event_type), event.application_id.to_string()))
    }

    fn retry_partition_key(&self, payload: &[u8]) -> String {
        serde_json::from_slice::<ApplicationEvent>(payload)
            .map(|e| e.user_id.to_string())
            .unwrap_or_else(|_| "0".to_string())
    }
}

/// Invalidates the `search:*` cache prefix on every `JobEvent` (§4.5.1,
/// §8 scenario 6: a job write must make the next identical search see
/// fresh data), then broadcasts the same invalidation (§4.5.6) so any other
/// gateway instance fronting its own Redis connection pool hears about it
/// too — additive to, never a substitute for, the direct scan+delete above.
pub struct CacheInvalidationHandler {
    cache: CacheAside,
    prefix: String,
    broadcaster: InvalidationBroadcaster,
}

impl CacheInvalidationHandler {
    pub fn new(cache: CacheAside, prefix: impl Into<String>, broadcaster: InvalidationBroadcaster) -> Self {
        Self { cache, prefix: prefix.into(), broadcaster }
    }
}

#[async_trait]
impl ConsumerHandler for CacheInvalidationHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), CoreError> {
        let event: JobEvent =
            serde_json::from_slice(payload).map_err(|e| CoreError::Permanent(format!("malformed JobEvent: {e}")))?;
        self.cache.invalidate_all(&self.prefix).await;
        debug!(job_id = event.job_id, prefix = %self.prefix, "search cache invalidated after job write");

        if let Err(e) = self.broadcaster.broadcast(&self.prefix).await {
            warn!(job_id = event.job_id, error = %e, "failed to broadcast cache invalidation to other instances");
        }

        Ok(())
    }

    fn business_identity(&self, payload: &[u8]) -> Option<(String, String)> {
        let event: JobEvent = serde_json::from_slice(payload).ok()?;
        Some((format!("cache-invalidation.{:?}", event.event_type), event.job_id.to_string()))
    }

    fn retry_partition_key(&self, payload: &[u8]) -> String {
        serde_json::from_slice::<JobEvent>(payload)
            .map(|e| e.job_id.to_string())
            .unwrap_or_else(|_| "0".to_string())
    }
}
