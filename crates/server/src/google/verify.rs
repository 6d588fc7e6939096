//! Id token verification.
//!
//! [`JwksVerifier`] checks the RS256 signature against Google's published
//! keys plus `aud`, `iss` and `exp`. [`UnverifiedDecoder`] only decodes the
//! payload and checks `aud`/`iss`; it exists for deployments that explicitly
//! opt out with `GOOGLE_VERIFY_ID_TOKEN=false`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::Deserialize;
use thiserror::Error;

/// Issuer strings Google puts in id tokens.
pub const GOOGLE_ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];

/// Google rotates keys roughly daily; an hour keeps the fetch rate negligible.
const JWKS_TTL: Duration = Duration::from_secs(60 * 60);

/// Minimum spacing between refetches triggered by an unknown `kid`.
const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// Base64url that tolerates both padded and unpadded segments.
const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors from id token verification.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token is not a well-formed JWT.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// No published key matches the token's `kid`.
    #[error("no signing key for kid {0:?}")]
    UnknownKey(Option<String>),

    /// Signature, expiry, audience or issuer check failed.
    #[error("{0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The `aud` claim does not name this client.
    #[error("audience mismatch")]
    Audience,

    /// The `iss` claim is not an accepted issuer.
    #[error("issuer mismatch")]
    Issuer,

    /// The key set could not be fetched.
    #[error("could not fetch signing keys: {0}")]
    KeyFetch(String),

    /// The key set endpoint did not answer in time.
    #[error("signing key fetch timed out")]
    KeyFetchTimeout,
}

/// Claims read from a Google id token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawIdClaims {
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Given name.
    #[serde(default)]
    pub given_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub family_name: Option<String>,
    /// Subject id.
    #[serde(default)]
    pub sub: Option<String>,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience (a string or an array of strings).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

impl RawIdClaims {
    fn audience_matches(&self, expected: &str) -> bool {
        match &self.aud {
            Some(serde_json::Value::String(aud)) => aud == expected,
            Some(serde_json::Value::Array(items)) => {
                items.iter().any(|item| item.as_str() == Some(expected))
            }
            _ => false,
        }
    }

    fn issuer_matches(&self, accepted: &[&str]) -> bool {
        self.iss
            .as_deref()
            .is_some_and(|iss| accepted.contains(&iss))
    }
}

/// Turns an id token into claims, rejecting tokens not meant for this client.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    /// Check `token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] when the token is malformed, untrusted, or
    /// was issued for another audience or by another issuer.
    async fn verify(
        &self,
        token: &str,
        audience: &str,
        issuers: &[&str],
    ) -> Result<RawIdClaims, VerifyError>;
}

// =============================================================================
// Signature-verifying implementation
// =============================================================================

#[derive(Debug, Clone)]
enum FetchError {
    Timeout,
    Failed(String),
}

impl From<FetchError> for VerifyError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => Self::KeyFetchTimeout,
            FetchError::Failed(msg) => Self::KeyFetch(msg),
        }
    }
}

enum KeySource {
    Static(Arc<JwkSet>),
    Remote {
        http: reqwest::Client,
        url: String,
        keys: Cache<(), Arc<JwkSet>>,
        recently_refreshed: Cache<(), ()>,
    },
}

/// Verifies RS256 id tokens against a JSON Web Key Set.
pub struct JwksVerifier {
    source: KeySource,
}

impl JwksVerifier {
    /// Verifier that fetches keys from `jwks_url` and caches them.
    #[must_use]
    pub fn new(http: reqwest::Client, jwks_url: impl Into<String>) -> Self {
        Self {
            source: KeySource::Remote {
                http,
                url: jwks_url.into(),
                keys: Cache::builder()
                    .max_capacity(1)
                    .time_to_live(JWKS_TTL)
                    .build(),
                recently_refreshed: Cache::builder()
                    .max_capacity(1)
                    .time_to_live(JWKS_REFRESH_COOLDOWN)
                    .build(),
            },
        }
    }

    /// Verifier over a fixed key set.
    #[must_use]
    pub fn from_jwk_set(keys: JwkSet) -> Self {
        Self {
            source: KeySource::Static(Arc::new(keys)),
        }
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, VerifyError> {
        let unknown = || VerifyError::UnknownKey(kid.map(String::from));

        match &self.source {
            KeySource::Static(keys) => {
                let jwk = find_key(keys, kid).ok_or_else(unknown)?;
                Ok(DecodingKey::from_jwk(jwk)?)
            }
            KeySource::Remote {
                http,
                url,
                keys,
                recently_refreshed,
            } => {
                let set = keys
                    .try_get_with((), fetch_jwks(http, url))
                    .await
                    .map_err(|e| VerifyError::from((*e).clone()))?;
                if let Some(jwk) = find_key(&set, kid) {
                    return Ok(DecodingKey::from_jwk(jwk)?);
                }

                // Keys may have rotated since the cached copy was fetched.
                if recently_refreshed.contains_key(&()) {
                    return Err(unknown());
                }
                recently_refreshed.insert((), ()).await;
                tracing::info!(kid = ?kid, "Unknown signing key, refreshing JWKS");
                keys.invalidate(&()).await;

                let set = keys
                    .try_get_with((), fetch_jwks(http, url))
                    .await
                    .map_err(|e| VerifyError::from((*e).clone()))?;
                let jwk = find_key(&set, kid).ok_or_else(unknown)?;
                Ok(DecodingKey::from_jwk(jwk)?)
            }
        }
    }
}

#[async_trait]
impl IdTokenVerifier for JwksVerifier {
    async fn verify(
        &self,
        token: &str,
        audience: &str,
        issuers: &[&str],
    ) -> Result<RawIdClaims, VerifyError> {
        let header = jsonwebtoken::decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(VerifyError::Malformed(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(issuers);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = jsonwebtoken::decode::<RawIdClaims>(token, &key, &validation)?;
        Ok(data.claims)
    }
}

fn find_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None => match keys.keys.as_slice() {
            [only] => Some(only),
            _ => None,
        },
    }
}

async fn fetch_jwks(http: &reqwest::Client, url: &str) -> Result<Arc<JwkSet>, FetchError> {
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Failed(e.to_string())
        }
    };

    let response = http.get(url).send().await.map_err(classify)?;
    if !response.status().is_success() {
        return Err(FetchError::Failed(format!(
            "JWKS endpoint returned {}",
            response.status()
        )));
    }

    let keys: JwkSet = response.json().await.map_err(classify)?;
    tracing::debug!(count = keys.keys.len(), "Fetched Google signing keys");
    Ok(Arc::new(keys))
}

// =============================================================================
// Decode-only implementation
// =============================================================================

/// Decodes the payload segment without checking the signature.
///
/// Only `aud` and `iss` are checked. Use [`JwksVerifier`] unless the
/// deployment has accepted the risk.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedDecoder;

impl UnverifiedDecoder {
    /// Decode the payload segment of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Malformed`] when the token has no payload
    /// segment or the payload is not base64url-encoded JSON.
    pub fn decode(token: &str) -> Result<RawIdClaims, VerifyError> {
        let payload = token
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| VerifyError::Malformed("missing payload segment".to_string()))?;

        let bytes = BASE64_URL_LENIENT
            .decode(payload)
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|e| VerifyError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl IdTokenVerifier for UnverifiedDecoder {
    async fn verify(
        &self,
        token: &str,
        audience: &str,
        issuers: &[&str],
    ) -> Result<RawIdClaims, VerifyError> {
        let claims = Self::decode(token)?;
        if !claims.audience_matches(audience) {
            return Err(VerifyError::Audience);
        }
        if !claims.issuer_matches(issuers) {
            return Err(VerifyError::Issuer);
        }
        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use base64::Engine as _;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PRIVATE_KEY: &[u8] = include_bytes!("../../tests/fixtures/test_rsa_key.pem");
    const JWKS: &str = include_str!("../../tests/fixtures/test_jwks.json");
    const KID: &str = "test-key-1";
    const AUDIENCE: &str = "client-123.apps.googleusercontent.com";

    fn sign(claims: &Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap();
        jsonwebtoken::encode(&header, claims, &key).unwrap()
    }

    fn claims(aud: &str, iss: &str, exp_offset_secs: i64) -> Value {
        json!({
            "iss": iss,
            "aud": aud,
            "sub": "110169484474386276334",
            "email": "jane@example.com",
            "given_name": "Jane",
            "family_name": "Doe",
            "iat": chrono::Utc::now().timestamp(),
            "exp": chrono::Utc::now().timestamp() + exp_offset_secs,
        })
    }

    fn static_verifier() -> JwksVerifier {
        JwksVerifier::from_jwk_set(serde_json::from_str(JWKS).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_verifies() {
        let token = sign(&claims(AUDIENCE, "https://accounts.google.com", 3600), KID);

        let claims = static_verifier()
            .verify(&token, AUDIENCE, GOOGLE_ISSUERS)
            .await
            .unwrap();

        assert_eq!(claims.email.as_deref(), Some("jane@example.com"));
        assert_eq!(claims.given_name.as_deref(), Some("Jane"));
        assert_eq!(claims.sub.as_deref(), Some("110169484474386276334"));
    }

    #[tokio::test]
    async fn test_bare_issuer_is_accepted() {
        let token = sign(&claims(AUDIENCE, "accounts.google.com", 3600), KID);
        assert!(
            static_verifier()
                .verify(&token, AUDIENCE, GOOGLE_ISSUERS)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_rejects_wrong_audience_issuer_and_expiry() {
        let verifier = static_verifier();

        let other_client = sign(&claims("someone-else", "https://accounts.google.com", 3600), KID);
        assert!(matches!(
            verifier.verify(&other_client, AUDIENCE, GOOGLE_ISSUERS).await,
            Err(VerifyError::Jwt(_))
        ));

        let other_issuer = sign(&claims(AUDIENCE, "https://evil.example", 3600), KID);
        assert!(matches!(
            verifier.verify(&other_issuer, AUDIENCE, GOOGLE_ISSUERS).await,
            Err(VerifyError::Jwt(_))
        ));

        let expired = sign(&claims(AUDIENCE, "https://accounts.google.com", -3600), KID);
        assert!(matches!(
            verifier.verify(&expired, AUDIENCE, GOOGLE_ISSUERS).await,
            Err(VerifyError::Jwt(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_tampered_payload() {
        let token = sign(&claims(AUDIENCE, "https://accounts.google.com", 3600), KID);
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = BASE64_URL_LENIENT.encode(
            serde_json::to_vec(&json!({
                "iss": "https://accounts.google.com",
                "aud": AUDIENCE,
                "email": "attacker@example.com",
                "exp": chrono::Utc::now().timestamp() + 3600,
            }))
            .unwrap(),
        );
        parts[1] = &forged;
        let tampered = parts.join(".");

        assert!(matches!(
            static_verifier()
                .verify(&tampered, AUDIENCE, GOOGLE_ISSUERS)
                .await,
            Err(VerifyError::Jwt(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let token = sign(&claims(AUDIENCE, "https://accounts.google.com", 3600), "rotated");
        assert!(matches!(
            static_verifier().verify(&token, AUDIENCE, GOOGLE_ISSUERS).await,
            Err(VerifyError::UnknownKey(Some(kid))) if kid == "rotated"
        ));
    }

    #[tokio::test]
    async fn test_remote_keys_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let verifier = JwksVerifier::new(reqwest::Client::new(), format!("{}/certs", server.uri()));
        let token = sign(&claims(AUDIENCE, "https://accounts.google.com", 3600), KID);

        verifier.verify(&token, AUDIENCE, GOOGLE_ISSUERS).await.unwrap();
        verifier.verify(&token, AUDIENCE, GOOGLE_ISSUERS).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_kid_refetches_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
            .expect(2)
            .mount(&server)
            .await;

        let verifier = JwksVerifier::new(reqwest::Client::new(), format!("{}/certs", server.uri()));
        let token = sign(&claims(AUDIENCE, "https://accounts.google.com", 3600), "rotated");

        // First miss refetches, second miss is inside the cooldown.
        for _ in 0..2 {
            assert!(matches!(
                verifier.verify(&token, AUDIENCE, GOOGLE_ISSUERS).await,
                Err(VerifyError::UnknownKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_jwks_endpoint_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let verifier = JwksVerifier::new(reqwest::Client::new(), format!("{}/certs", server.uri()));
        let token = sign(&claims(AUDIENCE, "https://accounts.google.com", 3600), KID);

        assert!(matches!(
            verifier.verify(&token, AUDIENCE, GOOGLE_ISSUERS).await,
            Err(VerifyError::KeyFetch(_))
        ));
    }

    #[test]
    fn test_unverified_decode_handles_padding() {
        let payload = json!({"email": "a@b.com", "sub": "1"});
        let unpadded = BASE64_URL_LENIENT.encode(serde_json::to_vec(&payload).unwrap());
        let padded = base64::engine::general_purpose::URL_SAFE.encode(serde_json::to_vec(&payload).unwrap());

        for segment in [unpadded, padded] {
            let claims = UnverifiedDecoder::decode(&format!("eyJhbGciOiJub25lIn0.{segment}.")).unwrap();
            assert_eq!(claims.email.as_deref(), Some("a@b.com"));
        }
    }

    #[test]
    fn test_unverified_decode_rejects_garbage() {
        assert!(matches!(
            UnverifiedDecoder::decode("no-dots"),
            Err(VerifyError::Malformed(_))
        ));
        assert!(matches!(
            UnverifiedDecoder::decode("a.%%%.c"),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unverified_decoder_checks_audience_and_issuer() {
        let good = sign(&claims(AUDIENCE, "accounts.google.com", 3600), KID);
        assert!(UnverifiedDecoder.verify(&good, AUDIENCE, GOOGLE_ISSUERS).await.is_ok());

        let wrong_aud = sign(&claims("other", "accounts.google.com", 3600), KID);
        assert!(matches!(
            UnverifiedDecoder.verify(&wrong_aud, AUDIENCE, GOOGLE_ISSUERS).await,
            Err(VerifyError::Audience)
        ));

        let wrong_iss = sign(&claims(AUDIENCE, "https://evil.example", 3600), KID);
        assert!(matches!(
            UnverifiedDecoder.verify(&wrong_iss, AUDIENCE, GOOGLE_ISSUERS).await,
            Err(VerifyError::Issuer)
        ));
    }

    #[test]
    fn test_audience_array() {
        let claims = RawIdClaims {
            aud: Some(json!(["x", AUDIENCE])),
            ..RawIdClaims::default()
        };
        assert!(claims.audience_matches(AUDIENCE));
        assert!(!claims.audience_matches("y"));
    }
}
