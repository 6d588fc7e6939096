//! Google OAuth identity exchange.
//!
//! Turns an authorization code into [`identity_bridge_core::IdentityClaims`]:
//!
//! 1. [`GoogleClient::exchange_code`] posts the code to the token endpoint
//! 2. An [`IdTokenVerifier`] checks and decodes the returned id token
//! 3. [`GoogleIdentityProvider`] maps the token claims into `IdentityClaims`
//!
//! The handler only sees the [`IdentityProvider`] trait so tests can swap in
//! scripted identities.

mod client;
mod provider;
mod verify;

pub use client::{GoogleClient, TokenResponse};
pub use provider::{GoogleIdentityProvider, IdentityProvider};
pub use verify::{
    GOOGLE_ISSUERS, IdTokenVerifier, JwksVerifier, RawIdClaims, UnverifiedDecoder, VerifyError,
};

use thiserror::Error;

/// Errors from the identity exchange.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The token endpoint rejected the code.
    #[error("Google exchange failed with status {status}")]
    ExchangeFailed {
        /// HTTP status from the token endpoint.
        status: u16,
        /// Provider error body (JSON when the provider sent JSON).
        details: serde_json::Value,
    },

    /// The token endpoint answered without an `id_token`.
    #[error("No id_token returned by Google")]
    MissingToken {
        /// Token response with credentials removed.
        details: serde_json::Value,
    },

    /// The id token carried no usable email.
    #[error("No email in id_token")]
    MissingEmail,

    /// The id token failed verification.
    #[error("Invalid id_token: {0}")]
    InvalidToken(#[from] VerifyError),

    /// The token endpoint did not answer in time.
    #[error("Google token endpoint timed out")]
    Timeout,

    /// Transport failure talking to Google.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}
