//! Code to claims, end to end.

use std::sync::Arc;

use async_trait::async_trait;
use identity_bridge_core::{Email, IdentityClaims};
use tracing::instrument;

use super::verify::{GOOGLE_ISSUERS, IdTokenVerifier, JwksVerifier, RawIdClaims, UnverifiedDecoder, VerifyError};
use super::{GoogleClient, IdentityError};
use crate::config::GoogleConfig;

/// Resolves an authorization code into the caller's identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange `code` (obtained with `redirect_uri`) and return the claims.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] describing which step failed.
    async fn resolve(&self, code: &str, redirect_uri: &str) -> Result<IdentityClaims, IdentityError>;
}

/// [`IdentityProvider`] backed by Google's token endpoint.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    client: GoogleClient,
    verifier: Arc<dyn IdTokenVerifier>,
}

impl GoogleIdentityProvider {
    /// Create a provider with an explicit verifier.
    #[must_use]
    pub fn new(client: GoogleClient, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        Self { client, verifier }
    }

    /// Build the provider from configuration.
    ///
    /// Uses [`JwksVerifier`] unless `verify_id_token` is off.
    #[must_use]
    pub fn from_config(config: &GoogleConfig, http: reqwest::Client) -> Self {
        let verifier: Arc<dyn IdTokenVerifier> = if config.verify_id_token {
            Arc::new(JwksVerifier::new(http.clone(), config.jwks_url.clone()))
        } else {
            tracing::warn!(
                "GOOGLE_VERIFY_ID_TOKEN=false: id token signatures are NOT verified"
            );
            Arc::new(UnverifiedDecoder)
        };

        Self::new(GoogleClient::new(config, http), verifier)
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    #[instrument(skip(self, code))]
    async fn resolve(&self, code: &str, redirect_uri: &str) -> Result<IdentityClaims, IdentityError> {
        let tokens = self.client.exchange_code(code, redirect_uri).await?;

        let raw = self
            .verifier
            .verify(&tokens.id_token, self.client.client_id(), GOOGLE_ISSUERS)
            .await
            .map_err(|e| match e {
                VerifyError::KeyFetchTimeout => IdentityError::Timeout,
                other => IdentityError::InvalidToken(other),
            })?;

        claims_from_raw(raw)
    }
}

/// Map token claims into [`IdentityClaims`], requiring a parseable email.
fn claims_from_raw(raw: RawIdClaims) -> Result<IdentityClaims, IdentityError> {
    let email = raw
        .email
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or(IdentityError::MissingEmail)?;
    let email = Email::parse(email).map_err(|e| {
        tracing::warn!(error = %e, "id token email did not parse");
        IdentityError::MissingEmail
    })?;

    Ok(IdentityClaims {
        email,
        given_name: raw.given_name.unwrap_or_default(),
        family_name: raw.family_name.unwrap_or_default(),
        subject: raw.sub.filter(|s| !s.is_empty()),
    })
}
