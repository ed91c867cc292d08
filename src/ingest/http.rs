//! HTTP surface for ingestion (axum)
//!
//! Every authenticated request answers 200 (stored, duplicate, rejected or a
//! storage error) so upstream senders never retry; only a bad secret gets 401.
//! SQLite work runs on the blocking pool, off the async workers.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use super::{Channel, IngestOutcome, IngestionGateway, SECRET_HEADER};
use crate::error::IngestError;

pub fn create_router(gateway: Arc<IngestionGateway>) -> Router {
    Router::new()
        .route("/webhook/email", post(email_webhook))
        .route("/webhook/notify", post(notify_webhook))
        .route("/health", get(health))
        .with_state(gateway)
}

/// Bind and serve until the task is dropped
pub async fn serve(port: u16, gateway: Arc<IngestionGateway>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind webhook server to {}", addr))?;
    info!(%addr, "Webhook server listening");
    axum::serve(listener, create_router(gateway))
        .await
        .context("Webhook server failed")
}

async fn email_webhook(
    State(gateway): State<Arc<IngestionGateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle(gateway, Channel::Email, headers, body).await
}

async fn notify_webhook(
    State(gateway): State<Arc<IngestionGateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle(gateway, Channel::Notify, headers, body).await
}

async fn health() -> &'static str {
    "OK"
}

async fn handle(gateway: Arc<IngestionGateway>, channel: Channel, headers: HeaderMap, body: Bytes) -> Response {
    let secret = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome =
        tokio::task::spawn_blocking(move || gateway.ingest(channel, secret.as_deref(), &body)).await;

    match outcome {
        Ok(Ok(IngestOutcome::Stored(item))) => {
            Json(serde_json::json!({ "status": "stored", "id": item.id })).into_response()
        }
        Ok(Ok(IngestOutcome::Duplicate(_))) => Json(serde_json::json!({ "status": "duplicate" })).into_response(),
        Ok(Err(IngestError::Unauthorized)) => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
        Ok(Err(IngestError::Validation(reason))) => {
            Json(serde_json::json!({ "status": "rejected", "reason": reason })).into_response()
        }
        Ok(Err(IngestError::Store(e))) => {
            error!(channel = %channel, error = %e, "Failed to store event");
            storage_unavailable()
        }
        Err(e) => {
            error!(channel = %channel, error = %e, "Ingest task failed");
            storage_unavailable()
        }
    }
}

fn storage_unavailable() -> Response {
    Json(serde_json::json!({ "status": "error", "reason": "storage unavailable" })).into_response()
}
