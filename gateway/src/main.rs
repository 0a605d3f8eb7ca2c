use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use cache_layer::InvalidationBroadcaster;
use consumer_runtime::{ConsumerRuntime, ConsumerRuntimeConfig};
use db_pool::DbConfig;
use event_contracts::topics;
use redis::aio::ConnectionManager as RedisConnectionManager;
use resilience::{presets, CircuitBreaker, CircuitBreakerConfig};
use retry_pipeline::RetryConsumer;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;

mod bus;
mod cache;
mod config;
mod handlers;
mod health;

use bus::BusBuildResult;
use cache::GatewayCache;
use config::GatewayConfig;
use handlers::{CacheInvalidationHandler, LoggingSender, NotificationChannelHandler};
use idempotency_store::IdempotencyStore;
use outbox_core::{OutboxMetrics, OutboxPublisher, SqlxOutboxRepository};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("starting gateway");

    let config = GatewayConfig::from_env();
    info!(env = %config.app.env, http_port = config.app.http_port, "configuration loaded");

    let db_config = DbConfig::for_service("gateway");
    let pg_pool = db_pool::create_pool(db_config).await.context("failed to create database pool")?;
    info!("database pool created");

    sqlx::migrate!("./migrations").run(&pg_pool).await.context("failed to run database migrations")?;
    info!("database migrations completed");

    let redis_client = redis::Client::open(config.redis.url.as_str()).context("failed to create Redis client")?;
    let redis_conn = RedisConnectionManager::new(redis_client).await.context("failed to connect to Redis")?;
    info!("redis connection established");

    let event_bus = match bus::build_event_bus(&config.bus) {
        BusBuildResult::Kafka(bus) => bus,
        BusBuildResult::Noop(bus, reason) => {
            tracing::warn!(reason = %reason, "gateway running with a degraded no-op event bus");
            bus
        }
        BusBuildResult::Failed(reason) => {
            return Err(anyhow::anyhow!("failed to build event bus: {}", reason));
        }
    };

    let outbox_repo = Arc::new(SqlxOutboxRepository::new(pg_pool.clone()));
    let outbox_metrics = OutboxMetrics::new("gateway");
    let outbox_publisher = Arc::new(
        OutboxPublisher::new(outbox_repo.clone(), event_bus.clone(), config.outbox.clone()).with_metrics(outbox_metrics),
    );

    let idempotency = IdempotencyStore::new(redis_conn.clone());
    let gateway_cache = GatewayCache::new(redis_conn.clone());

    let mut join_set = JoinSet::new();

    join_set.spawn(async move { outbox_publisher.run().await });
    info!("outbox publisher started");

    // Notification channels (§4.3, §5): one ConsumerRuntime per channel,
    // subscribed to the application.created topic, routing failures to its
    // own retry-topic partition space and re-invoked by its own RetryConsumer.
    let channel_breakers = [
        ("email", presets::email_channel_config(), config.channels.email_bulkhead),
        ("sms", presets::sms_channel_config(), config.channels.sms_bulkhead),
        (
            "push",
            CircuitBreakerConfig::new("push", Duration::from_secs(20)),
            config.channels.push_bulkhead,
        ),
    ];

    for (channel, breaker_config, bulkhead_size) in channel_breakers {
        let breaker = Arc::new(CircuitBreaker::new(breaker_config));
        let handler = Arc::new(NotificationChannelHandler::new(channel, LoggingSender::new(channel), breaker));

        let runtime_config = ConsumerRuntimeConfig::new(channel, topics::NOTIFICATION_RETRY, bulkhead_size);
        let runtime = Arc::new(ConsumerRuntime::new(
            handler,
            event_bus.clone(),
            idempotency.clone(),
            runtime_config,
        ));

        let group = format!("gateway-{channel}");
        event_bus
            .subscribe(topics::APPLICATION_CREATED, &group, runtime.clone())
            .await
            .with_context(|| format!("failed to subscribe {channel} channel to {}", topics::APPLICATION_CREATED))?;
        info!(channel, "notification channel subscribed");

        let retry_backoff = config.retry.clone();
        let retry_group = format!("gateway-retry-{channel}");
        let retry_bus = event_bus.clone();
        let retry_topic = topics::NOTIFICATION_RETRY.to_string();
        join_set.spawn(async move {
            let retry_consumer: Arc<dyn event_bus::EventHandler> =
                Arc::new(RetryConsumer::new(runtime, retry_backoff));
            retry_bus
                .subscribe(&retry_topic, &retry_group, retry_consumer)
                .await
                .map_err(|e| anyhow::anyhow!("failed to subscribe {} retry consumer: {}", channel, e))
        });
    }

    // Search-cache invalidation (§4.5.1, §8 scenario 6): one consumer bound
    // to job.lifecycle, no retry topic of its own since a missed
    // invalidation only widens the staleness window rather than losing data.
    let invalidation_broadcaster = InvalidationBroadcaster::new(redis_conn.clone(), "gateway");
    let cache_invalidation_handler = Arc::new(CacheInvalidationHandler::new(
        gateway_cache.search,
        cache::SEARCH_PREFIX,
        invalidation_broadcaster,
    ));
    let cache_runtime_config = ConsumerRuntimeConfig::new("cache-invalidation", topics::CACHE_INVALIDATION_RETRY, 4);
    let cache_runtime = Arc::new(ConsumerRuntime::new(
        cache_invalidation_handler,
        event_bus.clone(),
        idempotency.clone(),
        cache_runtime_config,
    ));
    event_bus
        .subscribe(topics::JOB_LIFECYCLE, "gateway-cache-invalidation", cache_runtime)
        .await
        .context("failed to subscribe cache invalidation handler to job.lifecycle")?;
    info!("cache invalidation handler subscribed");

    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    let outbox_repo_for_http = outbox_repo.clone();
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(outbox_repo_for_http.clone()))
            .route("/health", web::get().to(health::health))
            .route("/ready", web::get().to(health::ready))
            .route("/metrics", web::get().to(health::metrics))
            .route("/admin/outbox/stats", web::get().to(health::outbox_stats))
            .route("/admin/outbox/replay_since", web::post().to(health::outbox_replay_since))
            .route("/admin/outbox/replay_range", web::post().to(health::outbox_replay_range))
    })
    .bind(&http_addr)
    .context("failed to bind HTTP server")?
    .run();

    join_set.spawn(async move { http_server.await.map_err(|e| anyhow::anyhow!("HTTP server error: {}", e)) });
    info!(addr = %http_addr, "HTTP server started");

    join_set.spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        Ok(())
    });

    info!("gateway is running");

    while let Some(result) = join_set.join_next().await {
        match result {
            Ok(Ok(())) => {
                info!("a gateway task completed, shutting down");
                break;
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "gateway task failed");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(error = %e, "gateway task panicked");
                return Err(anyhow::anyhow!("task panicked: {}", e));
            }
        }
    }

    info!("gateway shutting down");
    Ok(())
}
