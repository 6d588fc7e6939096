//! Google OAuth token endpoint client.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::instrument;

use super::IdentityError;
use crate::config::GoogleConfig;

/// Response fields that must never be echoed back to callers.
const CREDENTIAL_FIELDS: &[&str] = &["access_token", "refresh_token", "id_token"];

/// Successful token exchange.
#[derive(Clone)]
pub struct TokenResponse {
    /// The `OpenID` Connect id token.
    pub id_token: String,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

/// Client for Google's OAuth 2.0 token endpoint.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl GoogleClient {
    /// Create a new client.
    ///
    /// `http` should carry the upstream timeout; it is shared with the JWKS fetcher.
    #[must_use]
    pub fn new(config: &GoogleConfig, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(GoogleClientInner {
                http,
                token_url: config.token_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            }),
        }
    }

    /// The OAuth client ID (the id token audience).
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `redirect_uri` must match the one used to obtain the code
    /// (`postmessage` for popup flows).
    ///
    /// # Errors
    ///
    /// - [`IdentityError::ExchangeFailed`] on a non-2xx response, with the provider's body
    /// - [`IdentityError::MissingToken`] when a 2xx response has no `id_token`
    /// - [`IdentityError::Timeout`] / [`IdentityError::Http`] on transport failures
    #[instrument(skip(self, code), fields(token_url = %self.inner.token_url))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, IdentityError> {
        let params = [
            ("code", code),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .inner
            .http
            .post(&self.inner.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let mut body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Google token exchange rejected");
            redact_credentials(&mut body);
            return Err(IdentityError::ExchangeFailed {
                status: status.as_u16(),
                details: body,
            });
        }

        let id_token = body
            .get("id_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(String::from);

        match id_token {
            Some(id_token) => Ok(TokenResponse { id_token }),
            None => {
                redact_credentials(&mut body);
                Err(IdentityError::MissingToken { details: body })
            }
        }
    }
}

/// Replace credential fields so provider bodies can be returned to callers.
fn redact_credentials(body: &mut Value) {
    if let Value::Object(map) = body {
        for field in CREDENTIAL_FIELDS {
            if let Some(value) = map.get_mut(*field) {
                *value = Value::String("[REDACTED]".to_string());
            }
        }
    }
}
