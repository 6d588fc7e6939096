//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the JSON error body is sent.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::google::IdentityError;
use crate::shopify::DirectoryError;

/// Application-level error type for the bridge.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request had no authorization code.
    #[error("Missing code")]
    MissingCode,

    /// The request body is not JSON of the expected shape.
    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    /// The Google exchange failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The customer directory failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

}

/// JSON error body: `{"error": ..., "details": ...}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    fn with_details(error: impl Into<String>, details: impl Into<Value>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingCode | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Identity(IdentityError::Timeout) | Self::Directory(DirectoryError::Timeout) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::Identity(IdentityError::Http(_)) | Self::Directory(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Identity(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn into_body(self) -> ErrorBody {
        match self {
            Self::MissingCode => ErrorBody::new("Missing code"),
            Self::InvalidBody(reason) => ErrorBody::with_details("Invalid JSON body", reason),
            Self::Identity(err) => match err {
                IdentityError::ExchangeFailed { details, .. } => {
                    ErrorBody::with_details("Google exchange failed", details)
                }
                IdentityError::MissingToken { details } => {
                    ErrorBody::with_details("No id_token returned by Google", details)
                }
                IdentityError::MissingEmail => ErrorBody::new("No email in id_token"),
                IdentityError::InvalidToken(reason) => {
                    ErrorBody::with_details("Invalid id_token", reason.to_string())
                }
                IdentityError::Timeout => {
                    ErrorBody::with_details("Upstream timeout", IdentityError::Timeout.to_string())
                }
                IdentityError::Http(_) => ErrorBody::new("Google request failed"),
            },
            Self::Directory(err) => match err {
                DirectoryError::Validation(info) => ErrorBody::new(info.message),
                DirectoryError::Timeout => {
                    ErrorBody::with_details("Upstream timeout", DirectoryError::Timeout.to_string())
                }
                // Don't expose directory internals to clients
                _ => ErrorBody::new("Customer directory error"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::info!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.into_body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
