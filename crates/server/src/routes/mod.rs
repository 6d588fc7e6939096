//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET     /health    - Liveness check
//! OPTIONS /exchange  - CORS preflight (204)
//! POST    /exchange  - Google code exchange + customer find-or-create
//! ```

pub mod exchange;

use axum::{
    Json, Router,
    extract::Request,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{allow_origin_layer, preflight, request_id_middleware};
use crate::state::AppState;

/// Create the API routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/exchange", post(exchange::exchange).options(preflight))
}

/// Build the full application router with its middleware stack.
///
/// Sentry layers are added by the binary, outside this stack.
pub fn router(state: AppState) -> Router {
    let origin = state.cors_origin().clone();

    Router::new()
        .route("/health", get(health))
        .merge(routes())
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(allow_origin_layer(origin))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check upstreams.
pub async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}
