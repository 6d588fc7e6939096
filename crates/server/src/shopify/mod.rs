//! Shopify Admin API client for customer records.
//!
//! # Security
//!
//! The Admin access token can read and write every customer in the shop. It
//! is held as a [`secrecy::SecretString`] and only ever sent in the
//! `X-Shopify-Access-Token` header.
//!
//! # Architecture
//!
//! - Hand-written GraphQL documents posted as `{query, variables}`
//! - One request per operation, no retries
//! - [`AdminClient`] implements [`crate::services::CustomerDirectory`]

mod admin;
mod customers;

pub use admin::AdminClient;

use thiserror::Error;

/// Errors from the customer directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory rejected the input (first reported user error).
    #[error("{0}")]
    Validation(UserErrorInfo),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The directory did not answer in time.
    #[error("Shopify request timed out")]
    Timeout,

    /// Non-2xx response other than 401/429.
    #[error("Shopify returned status {status}")]
    Status {
        /// HTTP status.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The access token was rejected.
    #[error("Unauthorized: invalid or revoked Admin access token")]
    Unauthorized,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response lacked an expected field.
    #[error("Missing {0} in Shopify response")]
    MissingData(&'static str),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl DirectoryError {
    /// Whether this is a uniqueness violation on the customer email.
    #[must_use]
    pub fn is_taken(&self) -> bool {
        match self {
            Self::Validation(info) => info.is_taken(),
            _ => false,
        }
    }
}

/// A `userErrors` entry from a mutation payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct UserErrorInfo {
    /// Path to the offending input field.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code, when the mutation reports one.
    #[serde(default)]
    pub code: Option<String>,
}

impl UserErrorInfo {
    fn is_taken(&self) -> bool {
        self.code.as_deref() == Some("TAKEN") || self.message.to_lowercase().contains("taken")
    }
}

impl std::fmt::Display for UserErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the error in the response.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
