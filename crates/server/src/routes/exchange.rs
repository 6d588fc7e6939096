//! `POST /exchange`: Google authorization code in, Shopify customer out.

use axum::{Json, body::Bytes, extract::State};
use identity_bridge_core::ProfileExtras;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Request body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    /// Authorization code from the Google client library.
    #[serde(default)]
    pub code: Option<String>,
    /// Redirect URI the code was issued for; defaults to the configured one.
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Optional profile fields stored as customer metadata.
    #[serde(default)]
    pub extra: Option<ProfileExtras>,
}

/// Success body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    /// Always `true`.
    pub ok: bool,
    /// Email from the id token.
    pub email: String,
    /// Shopify customer GID.
    pub customer_id: String,
    /// Given name, omitted when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    /// Family name, omitted when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    /// Whether the customer existed before this request.
    pub exists: bool,
    /// Where the frontend should navigate next.
    pub next_url: String,
}

/// Parse the body leniently: no content-type requirement, and an empty body
/// or `null` reads as `{}` so the caller gets "Missing code".
fn parse_body(body: &[u8]) -> Result<ExchangeRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExchangeRequest::default());
    }

    serde_json::from_slice::<Option<ExchangeRequest>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| AppError::InvalidBody(e.to_string()))
}

/// Exchange an authorization code and find-or-create the customer.
#[instrument(skip_all)]
pub async fn exchange(State(state): State<AppState>, body: Bytes) -> Result<Json<ExchangeResponse>> {
    let request = parse_body(&body)?;

    let code = request
        .code
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or(AppError::MissingCode)?;

    let redirect_uri = request
        .redirect_uri
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(&state.config().google.default_redirect_uri);

    let claims = state.identity().resolve(code, redirect_uri).await?;

    let extras = request.extra.unwrap_or_default();
    let outcome = state.customers().find_or_create(&claims, &extras).await?;

    Ok(Json(ExchangeResponse {
        ok: true,
        email: claims.email.into_inner(),
        customer_id: outcome.customer_id.to_string(),
        first_name: claims.given_name,
        last_name: claims.family_name,
        exists: outcome.existed,
        next_url: state.config().post_login_url.clone(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_empty_and_null() {
        let bodies: [&[u8]; 4] = [b"", b"  \n", b"null", b"{}"];
        for body in bodies {
            let request = parse_body(body).unwrap();
            assert!(request.code.is_none());
        }
    }

    #[test]
    fn test_parse_body_full() {
        let request = parse_body(
            br#"{"code":"4/0A","redirectUri":"https://shop.example","extra":{"company":"Kiko"}}"#,
        )
        .unwrap();
        assert_eq!(request.code.as_deref(), Some("4/0A"));
        assert_eq!(request.redirect_uri.as_deref(), Some("https://shop.example"));
        assert_eq!(request.extra.unwrap().company.as_deref(), Some("Kiko"));
    }

    #[test]
    fn test_parse_body_numeric_extras() {
        let request = parse_body(br#"{"code":"4/0A","extra":{"phone":5551234,"vat":"GB1"}}"#).unwrap();
        let extra = request.extra.unwrap();
        assert_eq!(extra.phone.as_deref(), Some("5551234"));
        assert_eq!(extra.vat.as_deref(), Some("GB1"));
    }

    #[test]
    fn test_parse_body_invalid() {
        assert!(matches!(parse_body(b"{not json"), Err(AppError::InvalidBody(_))));
        assert!(matches!(parse_body(b"[1,2]"), Err(AppError::InvalidBody(_))));
        assert!(matches!(
            parse_body(br#"{"code": 42}"#),
            Err(AppError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_response_omits_empty_names() {
        let response = ExchangeResponse {
            ok: true,
            email: "a@b.com".to_string(),
            customer_id: "gid://shopify/Customer/1".to_string(),
            first_name: String::new(),
            last_name: "Doe".to_string(),
            exists: false,
            next_url: "/account".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "ok": true,
                "email": "a@b.com",
                "customerId": "gid://shopify/Customer/1",
                "lastName": "Doe",
                "exists": false,
                "nextUrl": "/account",
            })
        );
    }
}
