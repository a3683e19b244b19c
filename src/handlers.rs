use std::{sync::Arc, time::Duration};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use http_body_util::BodyExt;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::{
    dns::{Changes, Endpoint},
    error::ProviderError,
    provider::Provider,
};

// Content-Type required by the external-dns webhook protocol
pub const WEBHOOK_CT: &str = "application/external.dns.webhook+json;version=1";

// ─────────────────────────────────────────────────────────────────────────────
// Shared application state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    /// Deadline for one apply; the in-flight backend call is dropped on expiry.
    pub apply_timeout: Duration,
}

/// The webhook routes under `prefix` ("" or e.g. "/gcp").
///
/// Unsupported methods on the record endpoints answer 400, as external-dns's
/// own webhook server does.
pub fn router(state: AppState, prefix: &str) -> Router {
    let prefix = match prefix.trim_matches('/') {
        "" => String::new(),
        p => format!("/{p}"),
    };

    let mut app = Router::new();
    if !prefix.is_empty() {
        app = app.route(&prefix, get(negotiate));
    }

    app.route(&format!("{prefix}/"), get(negotiate))
        .route("/healthz", get(healthz))
        .route(
            &format!("{prefix}/records"),
            get(get_records).post(apply_changes).fallback(bad_request),
        )
        .route(
            &format!("{prefix}/adjustendpoints"),
            post(adjust_endpoints).fallback(bad_request),
        )
        .with_state(state)
}

/// [`router`] wrapped in HTTP tracing and request body logging.
pub fn app(state: AppState, prefix: &str) -> Router {
    router(state, prefix).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(log_request_body)),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Request body logging middleware
//
// Reads the full body into memory, logs it at DEBUG level, then puts it back
// so the handler can still deserialise it.
// ─────────────────────────────────────────────────────────────────────────────

async fn log_request_body(req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {e}");
            return next.run(Request::from_parts(parts, Body::empty())).await;
        }
    };

    if tracing::enabled!(tracing::Level::DEBUG) && !bytes.is_empty() {
        let body_str = std::str::from_utf8(&bytes)
            .map(str::to_string)
            .unwrap_or_else(|_| format!("<{} binary bytes>", bytes.len()));

        debug!(
            method = %parts.method,
            path   = %parts.uri.path(),
            body   = %body_str,
            "← request body"
        );
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn webhook_json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(WEBHOOK_CT))],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("failed to encode response: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ── GET /healthz ──────────────────────────────────────────────────────────────

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

// ── GET / ─────────────────────────────────────────────────────────────────────
// Domain-filter negotiation.

pub async fn negotiate(State(state): State<AppState>) -> Response {
    let filter = state.provider.domain_filter().await;
    debug!("negotiate → {:?}", filter.filters());
    webhook_json(StatusCode::OK, &filter.to_wire())
}

// ── GET /records ──────────────────────────────────────────────────────────────

pub async fn get_records(State(state): State<AppState>) -> Response {
    match state.provider.records().await {
        Ok(eps) => {
            info!("GET /records → {} endpoint(s)", eps.len());
            webhook_json(StatusCode::OK, &eps)
        }
        Err(e) => {
            error!("Failed to get records: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ── POST /records ─────────────────────────────────────────────────────────────

pub async fn apply_changes(State(state): State<AppState>, body: Bytes) -> Response {
    let changes: Changes = match serde_json::from_slice(&body) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to decode changes: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    info!(
        create = changes.create.len(),
        update = changes.update_new.len(),
        delete = changes.delete.len(),
        "POST /records"
    );

    let outcome = tokio::time::timeout(state.apply_timeout, state.provider.apply_changes(changes))
        .await
        .unwrap_or_else(|_| {
            Err(ProviderError::DeadlineExceeded {
                operation: "apply changes".into(),
                seconds: state.apply_timeout.as_secs(),
            })
        });

    match outcome {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to apply changes: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ── POST /adjustendpoints ─────────────────────────────────────────────────────
//
// Adjustment is advisory: if the provider fails, the caller still gets a 200
// with an empty list and the failure is only logged.

pub async fn adjust_endpoints(State(state): State<AppState>, body: Bytes) -> Response {
    let endpoints: Vec<Endpoint> = match serde_json::from_slice(&body) {
        Ok(eps) => eps,
        Err(e) => {
            error!("Failed to decode endpoints: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let adjusted = match state.provider.adjust_endpoints(endpoints).await {
        Ok(eps) => eps,
        Err(e) => {
            error!("Failed to adjust endpoints: {e}");
            Vec::new()
        }
    };

    webhook_json(StatusCode::OK, &adjusted)
}

// ── anything else ─────────────────────────────────────────────────────────────

async fn bad_request() -> StatusCode {
    StatusCode::BAD_REQUEST
}
