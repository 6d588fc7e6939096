//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (added in `main`)
//! 2. Allow-origin header (every response, including 404s and errors)
//! 3. `TraceLayer` (request span with `request_id` field)
//! 4. Request ID (fills the span field, echoes `x-request-id`)

pub mod cors;
pub mod request_id;

pub use cors::{allow_origin_layer, preflight};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
