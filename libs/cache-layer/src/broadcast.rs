//! Optional cross-instance invalidation fanout, layered on top of the direct
//! `SCAN`+`DEL` §4.5.1 describes. A single instance's prefix invalidation is
//! already correct for its own Redis connection; the broadcaster exists so a
//! fleet of instances fronting separate connection pools (or an in-process
//! cache on top of Redis) hear about it too.

use crate::error::CacheResult;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationMessage {
    pub prefix: String,
    pub source_service: String,
}

pub struct InvalidationBroadcaster {
    redis: ConnectionManager,
    channel: String,
    service_name: String,
}

impl InvalidationBroadcaster {
    pub const DEFAULT_CHANNEL: &'static str = "cache:invalidate";

    pub fn new(redis: ConnectionManager, service_name: impl Into<String>) -> Self {
        Self {
            redis,
            channel: Self::DEFAULT_CHANNEL.to_string(),
            service_name: service_name.into(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Returns the number of subscribers that received the message.
    pub async fn broadcast(&self, prefix: &str) -> CacheResult<usize> {
        let msg = InvalidationMessage {
            prefix: prefix.to_string(),
            source_service: self.service_name.clone(),
        };
        let payload = serde_json::to_string(&msg)?;
        let mut conn = self.redis.clone();
        let subscribers: usize = conn.publish(&self.channel, payload).await?;
        debug!(prefix, subscribers, "broadcast cache invalidation");
        Ok(subscribers)
    }
}

pub struct InvalidationSubscriber {
    client: Client,
    channel: String,
}

impl InvalidationSubscriber {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            channel: InvalidationBroadcaster::DEFAULT_CHANNEL.to_string(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Spawns a background task that invokes `callback` for every
    /// invalidation broadcast on the channel. The returned handle can be
    /// aborted to stop listening.
    pub async fn subscribe<F, Fut>(&self, callback: F) -> CacheResult<JoinHandle<()>>
    where
        F: Fn(InvalidationMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        info!(channel = %self.channel, "subscribed to cache invalidation broadcasts");

        let callback = Arc::new(callback);
        let handle = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload = match msg.get_payload::<String>() {
                    Ok(p) => p,
                    Err(e) => {
                        error!(error = ?e, "failed to read invalidation broadcast payload");
                        continue;
                    }
                };
                let invalidation: InvalidationMessage = match serde_json::from_str(&payload) {
                    Ok(m) => m,
                    Err(e) => {
                        error!(error = ?e, payload = %payload, "failed to deserialize invalidation broadcast");
                        continue;
                    }
                };
                (callback.clone())(invalidation).await;
            }
            warn!("cache invalidation broadcast subscription ended");
        });

        Ok(handle)
    }
}
