//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::config::BridgeConfig;
use crate::google::{GoogleIdentityProvider, IdentityProvider};
use crate::services::{CustomerDirectory, CustomerSync};
use crate::shopify::AdminClient;

/// Upper bound on establishing an upstream connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid CORS origin header value: {0}")]
    InvalidOrigin(#[from] axum::http::header::InvalidHeaderValue),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Built once at startup; nothing in it changes
/// while the server runs.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BridgeConfig,
    identity: Arc<dyn IdentityProvider>,
    customers: CustomerSync,
    cors_origin: HeaderValue,
}

impl AppState {
    /// Build state with the real Google and Shopify clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the CORS origin is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn from_config(config: BridgeConfig) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.upstream_timeout))
            .user_agent(concat!("identity-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let identity = Arc::new(GoogleIdentityProvider::from_config(
            &config.google,
            http.clone(),
        ));
        let directory = Arc::new(AdminClient::new(&config.shopify, http));

        Self::new(config, identity, directory)
    }

    /// Build state around explicit upstream implementations.
    ///
    /// # Errors
    ///
    /// Returns an error if the CORS origin is not a valid header value.
    pub fn new(
        config: BridgeConfig,
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn CustomerDirectory>,
    ) -> Result<Self, StateError> {
        let cors_origin = HeaderValue::from_str(&config.cors_allowed_origin)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                customers: CustomerSync::new(directory),
                cors_origin,
            }),
        })
    }

    /// Get a reference to the bridge configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Get the identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Get the customer sync service.
    #[must_use]
    pub fn customers(&self) -> &CustomerSync {
        &self.inner.customers
    }

    /// The `Access-Control-Allow-Origin` value sent on every response.
    #[must_use]
    pub fn cors_origin(&self) -> &HeaderValue {
        &self.inner.cors_origin
    }
}
