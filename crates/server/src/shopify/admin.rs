//! Transport for Admin API GraphQL calls.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{DirectoryError, GraphQLError};
use crate::config::ShopifyConfig;

/// Longest error body kept in [`DirectoryError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

impl<T> GraphQLResponse<T> {
    fn into_result(self) -> Result<T, DirectoryError> {
        if let Some(errors) = self.errors
            && !errors.is_empty()
        {
            return Err(DirectoryError::GraphQL(errors));
        }

        self.data.ok_or(DirectoryError::MissingData("data"))
    }
}

/// Shopify Admin API GraphQL client.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    http: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
}

impl AdminClient {
    /// Create a client for the configured shop.
    ///
    /// `http` should carry the upstream timeout.
    #[must_use]
    pub fn new(config: &ShopifyConfig, http: reqwest::Client) -> Self {
        Self::with_endpoint(
            config.graphql_endpoint(),
            config.admin_access_token.clone(),
            http,
        )
    }

    /// Create a client against an explicit GraphQL endpoint.
    #[must_use]
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        access_token: SecretString,
        http: reqwest::Client,
    ) -> Self {
        Self {
            inner: Arc::new(AdminClientInner {
                http,
                endpoint: endpoint.into(),
                access_token,
            }),
        }
    }

    /// Execute a GraphQL document and deserialize its `data`.
    pub(super) async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, DirectoryError> {
        let response = self
            .inner
            .http
            .post(&self.inner.endpoint)
            .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
            .json(&GraphQLRequest { query, variables })
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(2);
            return Err(DirectoryError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DirectoryError::Unauthorized);
        }

        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Shopify Admin API error response");
            let mut body = text;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<GraphQLResponse<T>>(&text)?.into_result()
    }
}
