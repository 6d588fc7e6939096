//! Integration tests for the identity bridge.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p identity-bridge-integration-tests
//! ```
//!
//! No external services are needed: upstreams are either in-memory fakes
//! ([`ScriptedIdentity`], [`InMemoryDirectory`]) or `wiremock` servers.
//!
//! # Test Categories
//!
//! - `exchange_routes` - Router behaviour against fakes
//! - `exchange_upstreams` - Real Google and Shopify clients against mock servers

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use identity_bridge::config::{BridgeConfig, GoogleConfig, POPUP_REDIRECT_URI, ShopifyConfig};
use identity_bridge::google::{
    GoogleClient, GoogleIdentityProvider, IdentityError, IdentityProvider, JwksVerifier,
};
use identity_bridge::routes;
use identity_bridge::services::CustomerDirectory;
use identity_bridge::shopify::{AdminClient, DirectoryError};
use identity_bridge::state::AppState;
use identity_bridge_core::{
    CustomerId, CustomerRecord, Email, IdentityClaims, MetadataEntry, NewCustomer,
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// Origin every test app is configured with.
pub const TEST_ORIGIN: &str = "https://shop.example";

/// OAuth client id every test app is configured with.
pub const TEST_CLIENT_ID: &str = "client-123.apps.googleusercontent.com";

/// Configuration pointing Google and Shopify at `google_base` / `shopify_endpoint`.
#[must_use]
pub fn test_config(google_base: &str, shopify_shop: &str) -> BridgeConfig {
    BridgeConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        cors_allowed_origin: TEST_ORIGIN.to_string(),
        post_login_url: "/account".to_string(),
        upstream_timeout: Duration::from_secs(2),
        google: GoogleConfig {
            client_id: TEST_CLIENT_ID.to_string(),
            client_secret: SecretString::from("GOCSPX-integration"),
            default_redirect_uri: POPUP_REDIRECT_URI.to_string(),
            token_url: format!("{google_base}/token"),
            jwks_url: format!("{google_base}/certs"),
            verify_id_token: true,
        },
        shopify: ShopifyConfig {
            shop: shopify_shop.to_string(),
            api_version: "2025-07".to_string(),
            admin_access_token: SecretString::from("shpat_integration"),
        },
        sentry_dsn: None,
        sentry_environment: None,
    }
}

// ============================================================================
// Fakes
// ============================================================================

type Script = Box<dyn Fn() -> Result<IdentityClaims, IdentityError> + Send + Sync>;

/// Identity provider that returns a scripted result and records its calls.
pub struct ScriptedIdentity {
    script: Script,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedIdentity {
    /// Always resolve to `claims`.
    #[must_use]
    pub fn returning(claims: IdentityClaims) -> Self {
        Self::scripted(move || Ok(claims.clone()))
    }

    /// Resolve by calling `script`.
    #[must_use]
    pub fn scripted(
        script: impl Fn() -> Result<IdentityClaims, IdentityError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(code, redirect_uri)` of every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    async fn resolve(&self, code: &str, redirect_uri: &str) -> Result<IdentityClaims, IdentityError> {
        self.calls
            .lock()
            .unwrap()
            .push((code.to_string(), redirect_uri.to_string()));
        (self.script)()
    }
}

/// Customer directory held in memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    customers: Mutex<Vec<CustomerRecord>>,
    metadata: Mutex<Vec<MetadataEntry>>,
    fail_metadata: AtomicBool,
    reject_create: Mutex<Option<String>>,
    finds: AtomicUsize,
    creates: AtomicUsize,
}

impl InMemoryDirectory {
    /// Seed an existing customer and return its id.
    pub fn insert(&self, email: &str) -> CustomerId {
        let mut customers = self.customers.lock().unwrap();
        let id = CustomerId::new(format!("gid://shopify/Customer/{}", customers.len() + 1)).unwrap();
        customers.push(CustomerRecord {
            id: id.clone(),
            email: Some(Email::parse(email).unwrap()),
        });
        id
    }

    /// Make every metadata write fail.
    pub fn fail_metadata(&self) {
        self.fail_metadata.store(true, Ordering::SeqCst);
    }

    /// Make every create fail with a validation error carrying `message`.
    pub fn reject_create(&self, message: &str) {
        *self.reject_create.lock().unwrap() = Some(message.to_string());
    }

    /// Number of customers stored.
    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.customers.lock().unwrap().len()
    }

    /// Metadata entries written so far.
    #[must_use]
    pub fn metadata(&self) -> Vec<MetadataEntry> {
        self.metadata.lock().unwrap().clone()
    }

    /// Number of lookups performed.
    #[must_use]
    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    /// Number of create attempts.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryDirectory {
    async fn find_by_email(&self, email: &Email) -> Result<Option<CustomerRecord>, DirectoryError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .customers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.email.as_ref() == Some(email))
            .cloned())
    }

    async fn create(&self, customer: &NewCustomer) -> Result<CustomerRecord, DirectoryError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.reject_create.lock().unwrap().clone() {
            return Err(DirectoryError::Validation(
                identity_bridge::shopify::UserErrorInfo {
                    field: Some(vec!["email".to_string()]),
                    message,
                    code: None,
                },
            ));
        }
        let id = self.insert(customer.email.as_str());
        Ok(CustomerRecord {
            id,
            email: Some(customer.email.clone()),
        })
    }

    async fn set_metadata(
        &self,
        _owner: &CustomerId,
        entries: &[MetadataEntry],
    ) -> Result<(), DirectoryError> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(DirectoryError::Status {
                status: 500,
                body: "metafields unavailable".to_string(),
            });
        }
        self.metadata.lock().unwrap().extend_from_slice(entries);
        Ok(())
    }
}

/// Claims for `email` with the given names.
#[must_use]
pub fn claims(email: &str, given: &str, family: &str) -> IdentityClaims {
    IdentityClaims {
        email: Email::parse(email).unwrap(),
        given_name: given.to_string(),
        family_name: family.to_string(),
        subject: Some("110169484474386276334".to_string()),
    }
}

// ============================================================================
// Test application
// ============================================================================

/// Response captured from the router.
#[derive(Debug)]
pub struct TestResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Router wired to fakes.
pub struct TestApp {
    router: Router,
    /// Identity fake.
    pub identity: Arc<ScriptedIdentity>,
    /// Directory fake.
    pub directory: Arc<InMemoryDirectory>,
}

impl TestApp {
    /// App whose identity provider behaves as `identity`.
    #[must_use]
    pub fn new(identity: ScriptedIdentity) -> Self {
        let identity = Arc::new(identity);
        let directory = Arc::new(InMemoryDirectory::default());
        let state = AppState::new(
            test_config("http://google.invalid", "shop.invalid"),
            identity.clone(),
            directory.clone(),
        )
        .unwrap();

        Self {
            router: routes::router(state),
            identity,
            directory,
        }
    }

    /// Send `request` through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }

    /// `POST /exchange` with a raw body.
    pub async fn post_exchange(&self, body: &str) -> TestResponse {
        self.send(
            Request::post("/exchange")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

/// Router wired to the real Google and Shopify clients.
///
/// `google_base` serves `/token` and `/certs`; `shopify_endpoint` is the
/// full GraphQL URL.
#[must_use]
pub fn upstream_router(google_base: &str, shopify_endpoint: &str) -> Router {
    let config = test_config(google_base, "shop.invalid");
    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .unwrap();

    let identity = Arc::new(GoogleIdentityProvider::new(
        GoogleClient::new(&config.google, http.clone()),
        Arc::new(JwksVerifier::new(http.clone(), config.google.jwks_url.clone())),
    ));
    let directory = Arc::new(AdminClient::with_endpoint(
        shopify_endpoint,
        config.shopify.admin_access_token.clone(),
        http,
    ));

    routes::router(AppState::new(config, identity, directory).unwrap())
}

/// Send `request` through `router` and collect the response.
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}
