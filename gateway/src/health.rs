//! HTTP surface: liveness/readiness probes, a Prometheus scrape endpoint,
//! and the outbox operator routes, generalized from `social-service`'s
//! `main.rs` (`/health`, `/ready`, `/admin/outbox/stats`,
//! `/admin/outbox/replay_since`, `/admin/outbox/replay_range`) plus
//! `notification-service`'s `metrics::serve_metrics`.

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use outbox_core::SqlxOutboxRepository;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use uuid::Uuid;

pub async fn health() -> impl Responder {
    "OK"
}

pub async fn ready() -> impl Responder {
    "READY"
}

pub async fn metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(e.to_string());
    }

    HttpResponse::Ok().content_type(encoder.format_type()).body(buffer)
}

pub async fn outbox_stats(repo: web::Data<Arc<SqlxOutboxRepository>>) -> impl Responder {
    match repo.pending_stats().await {
        Ok((count, age)) => HttpResponse::Ok().json(serde_json::json!({
            "pending_count": count,
            "oldest_pending_age_seconds": age,
        })),
        Err(e) => HttpResponse::InternalServerError().body(format!("error: {}", e)),
    }
}

#[derive(serde::Deserialize)]
pub struct ReplaySinceQuery {
    /// RFC3339 timestamp
    ts: String,
}

pub async fn outbox_replay_since(
    repo: web::Data<Arc<SqlxOutboxRepository>>,
    query: web::Query<ReplaySinceQuery>,
) -> impl Responder {
    match DateTime::parse_from_rfc3339(&query.ts).map(|dt| dt.with_timezone(&Utc)) {
        Ok(ts) => match repo.replay_since(ts).await {
            Ok(affected) => HttpResponse::Ok().json(serde_json::json!({
                "replayed": affected,
                "since": query.ts,
            })),
            Err(e) => HttpResponse::InternalServerError().body(format!("error: {}", e)),
        },
        Err(e) => HttpResponse::BadRequest().body(format!("invalid ts: {}", e)),
    }
}

#[derive(serde::Deserialize)]
pub struct ReplayRangeQuery {
    from_id: Uuid,
    to_id: Uuid,
}

pub async fn outbox_replay_range(
    repo: web::Data<Arc<SqlxOutboxRepository>>,
    query: web::Query<ReplayRangeQuery>,
) -> impl Responder {
    match repo.replay_range(query.from_id, query.to_id).await {
        Ok(affected) => HttpResponse::Ok().json(serde_json::json!({
            "replayed": affected,
            "from_id": query.from_id,
            "to_id": query.to_id,
        })),
        Err(e) => HttpResponse::InternalServerError().body(format!("error: {}", e)),
    }
}
