//! HTTP ingest for realtime row-change webhooks.
//!
//! The inbox backend (or any relay in front of its push channel) posts signed
//! row changes to `POST /api/realtime`; each accepted payload is classified and
//! published on the in-process [`RealtimeHub`], where the engine's realtime
//! consumer picks it up.
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::bus::{RealtimeEvent, RealtimeHub, RealtimePayload};

type HmacSha256 = Hmac<Sha256>;

/// Max webhook payload size: 1 MB.
const WEBHOOK_MAX_BODY: usize = 1_048_576;

#[derive(Clone)]
pub struct GatewayState {
    hub: Arc<RealtimeHub>,
    secret: Arc<str>,
}

impl GatewayState {
    pub fn new(hub: Arc<RealtimeHub>, secret: &str) -> Self {
        Self {
            hub,
            secret: Arc::from(secret),
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/realtime", post(realtime_handler))
        .with_state(state)
}

/// GET /api/health
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// Validate HMAC-SHA256 signature against a payload.
pub(crate) fn validate_webhook_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let result = mac.finalize();
    let expected = hex::encode(result.into_bytes());

    // Support both raw hex and "sha256=..." prefix (GitHub-style)
    let sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    expected.as_bytes().ct_eq(sig.as_bytes()).into()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

/// POST /api/realtime: verify, classify and publish one row change.
async fn realtime_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > WEBHOOK_MAX_BODY {
        warn!("realtime webhook: payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let signature = headers
        .get("X-Signature-256")
        .or_else(|| headers.get("X-Hub-Signature-256"))
        .and_then(|v| v.to_str().ok());
    let Some(signature) = signature else {
        warn!("realtime webhook: missing signature header");
        return StatusCode::FORBIDDEN.into_response();
    };
    if !validate_webhook_signature(&state.secret, signature, &body) {
        warn!("realtime webhook: invalid signature");
        return StatusCode::FORBIDDEN.into_response();
    }

    let payload: RealtimePayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("realtime webhook: malformed payload: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &format!("malformed payload: {e}"));
        }
    };
    let event = match RealtimeEvent::from_payload(payload) {
        Ok(event) => event,
        Err(e) => {
            debug!("realtime webhook: rejected row: {:#}", e);
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, &format!("{e:#}"));
        }
    };

    let kind = event.kind();
    let conversation_id = event.conversation_id().to_string();
    match state.hub.publish(event).await {
        Ok(delivered) => {
            debug!(
                "realtime webhook: {} for {} delivered to {}",
                kind, conversation_id, delivered
            );
            Json(serde_json::json!({
                "status": "ok",
                "event": kind,
                "delivered": delivered
            }))
            .into_response()
        }
        Err(e) => {
            warn!("realtime webhook: {}", e);
            error_response(StatusCode::TOO_MANY_REQUESTS, &e.to_string())
        }
    }
}

/// Start the gateway server.
pub async fn start(
    host: &str,
    port: u16,
    secret: &str,
    hub: Arc<RealtimeHub>,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = build_router(GatewayState::new(hub, secret));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("realtime gateway listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("gateway server error: {}", e);
        }
    });
    Ok(handle)
}
