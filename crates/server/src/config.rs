//! Bridge configuration loaded from environment variables.
//!
//! Loaded once at startup and shared read-only through [`crate::state::AppState`].
//!
//! # Environment Variables
//!
//! ## Required
//! - `GOOGLE_CLIENT_ID` - Google OAuth client ID (also the expected id token audience)
//! - `GOOGLE_CLIENT_SECRET` - Google OAuth client secret
//! - `SHOPIFY_SHOP` - Shopify shop domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_ADMIN_ACCESS_TOKEN` - Admin API access token
//! - `CORS_ALLOWED_ORIGIN` - The single origin allowed to call `/exchange`
//!
//! ## Optional
//! - `BRIDGE_HOST` - Bind address (default: 127.0.0.1)
//! - `BRIDGE_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2025-07)
//! - `GOOGLE_DEFAULT_REDIRECT_URI` - Redirect URI when the caller sends none (default: postmessage)
//! - `GOOGLE_TOKEN_URL` - Token endpoint (default: <https://oauth2.googleapis.com/token>)
//! - `GOOGLE_JWKS_URL` - Signing keys (default: <https://www.googleapis.com/oauth2/v3/certs>)
//! - `GOOGLE_VERIFY_ID_TOKEN` - Verify id token signatures (default: true)
//! - `UPSTREAM_TIMEOUT_SECS` - Timeout for every outbound call (default: 10)
//! - `POST_LOGIN_URL` - `nextUrl` returned on success (default: /account)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Redirect URI Google expects for codes obtained through the JS popup flow.
pub const POPUP_REDIRECT_URI: &str = "postmessage";

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Bridge application configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Origin echoed in `Access-Control-Allow-Origin` on every response
    pub cors_allowed_origin: String,
    /// Where the frontend should send the customer after sign-in
    pub post_login_url: String,
    /// Timeout applied to each outbound request
    pub upstream_timeout: Duration,
    /// Google OAuth configuration
    pub google: GoogleConfig,
    /// Shopify Admin API configuration
    pub shopify: ShopifyConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Google OAuth client configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct GoogleConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Redirect URI used when the caller does not supply one
    pub default_redirect_uri: String,
    /// Token endpoint
    pub token_url: String,
    /// JSON Web Key Set endpoint
    pub jwks_url: String,
    /// Whether id token signatures are verified
    pub verify_id_token: bool,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("default_redirect_uri", &self.default_redirect_uri)
            .field("token_url", &self.token_url)
            .field("jwks_url", &self.jwks_url)
            .field("verify_id_token", &self.verify_id_token)
            .finish()
    }
}

/// Shopify Admin API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Shop domain (e.g., your-store.myshopify.com)
    pub shop: String,
    /// Admin API version (e.g., 2025-07)
    pub api_version: String,
    /// Admin API access token
    pub admin_access_token: SecretString,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("shop", &self.shop)
            .field("api_version", &self.api_version)
            .field("admin_access_token", &"[REDACTED]")
            .finish()
    }
}

impl ShopifyConfig {
    /// Admin GraphQL endpoint for this shop.
    #[must_use]
    pub fn graphql_endpoint(&self) -> String {
        format!(
            "https://{}/admin/api/{}/graphql.json",
            self.shop, self.api_version
        )
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("BRIDGE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRIDGE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("BRIDGE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRIDGE_PORT".to_string(), e.to_string()))?;

        let cors_allowed_origin = get_required_env("CORS_ALLOWED_ORIGIN")?;
        validate_origin(&cors_allowed_origin, "CORS_ALLOWED_ORIGIN")?;

        let timeout_secs = get_env_or_default("UPSTREAM_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "UPSTREAM_TIMEOUT_SECS".to_string(),
                    "must be a positive number of seconds".to_string(),
                )
            })?;

        Ok(Self {
            host,
            port,
            cors_allowed_origin,
            post_login_url: get_env_or_default("POST_LOGIN_URL", "/account"),
            upstream_timeout: Duration::from_secs(timeout_secs),
            google: GoogleConfig::from_env()?,
            shopify: ShopifyConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl GoogleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let token_url = get_env_or_default("GOOGLE_TOKEN_URL", DEFAULT_TOKEN_URL);
        validate_url(&token_url, "GOOGLE_TOKEN_URL")?;
        let jwks_url = get_env_or_default("GOOGLE_JWKS_URL", DEFAULT_JWKS_URL);
        validate_url(&jwks_url, "GOOGLE_JWKS_URL")?;

        Ok(Self {
            client_id: get_required_env("GOOGLE_CLIENT_ID")?,
            client_secret: get_validated_secret("GOOGLE_CLIENT_SECRET")?,
            default_redirect_uri: get_env_or_default(
                "GOOGLE_DEFAULT_REDIRECT_URI",
                POPUP_REDIRECT_URI,
            ),
            token_url,
            jwks_url,
            verify_id_token: parse_bool(
                "GOOGLE_VERIFY_ID_TOKEN",
                &get_env_or_default("GOOGLE_VERIFY_ID_TOKEN", "true"),
            )?,
        })
    }
}

impl ShopifyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            shop: get_required_env("SHOPIFY_SHOP")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2025-07"),
            admin_access_token: get_validated_secret("SHOPIFY_ADMIN_ACCESS_TOKEN")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required, non-empty environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn validate_url(value: &str, var_name: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))
}

/// An origin is scheme + host (+ port) with no path, and must be a valid header value.
fn validate_origin(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    // Browsers compare Access-Control-Allow-Origin byte for byte, so only the
    // exact serialized origin is accepted (no trailing slash, lowercase host).
    if url.host_str().is_none() || value != url.origin().ascii_serialization() {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be a bare origin like https://shop.example".to_string(),
        ));
    }
    HeaderValue::from_str(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
