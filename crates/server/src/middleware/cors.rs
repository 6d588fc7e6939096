//! Fixed-origin CORS.
//!
//! The bridge serves exactly one frontend. Every response carries that
//! origin in `Access-Control-Allow-Origin` whatever the request's `Origin`
//! says; preflights are answered with 204 by [`preflight`].

use axum::{
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, VARY,
        },
    },
    response::{IntoResponse, Response},
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;

/// Methods the exchange endpoint accepts cross-origin.
pub const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Request headers a cross-origin caller may send.
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// How long browsers may cache a preflight (one day).
pub const PREFLIGHT_MAX_AGE: &str = "86400";

/// Layer that stamps the configured origin on every response.
#[must_use]
pub fn allow_origin_layer(origin: HeaderValue) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(ACCESS_CONTROL_ALLOW_ORIGIN, origin)
}

/// `OPTIONS` handler: 204 with the fixed CORS policy and no body.
pub async fn preflight(State(state): State<AppState>) -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, state.cors_origin().clone()),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            ),
            (VARY, HeaderValue::from_static("Origin")),
            (
                ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(PREFLIGHT_MAX_AGE),
            ),
        ],
    )
        .into_response()
}
