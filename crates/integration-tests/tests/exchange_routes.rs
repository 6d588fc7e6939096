//! Router behaviour for `/exchange` against in-memory upstreams.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use identity_bridge::google::{IdentityError, VerifyError};
use identity_bridge_integration_tests::{ScriptedIdentity, TEST_ORIGIN, TestApp, claims};
use serde_json::json;

fn jane() -> TestApp {
    TestApp::new(ScriptedIdentity::returning(claims(
        "jane@example.com",
        "Jane",
        "Doe",
    )))
}

// ============================================================================
// Preflight
// ============================================================================

#[tokio::test]
async fn test_preflight_returns_fixed_policy() {
    let app = jane();

    let response = app
        .send(
            Request::options("/exchange")
                .header("origin", "https://evil.example")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
    assert_eq!(response.headers["access-control-allow-origin"], TEST_ORIGIN);
    assert_eq!(response.headers["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(response.headers["access-control-allow-headers"], "Content-Type");
    assert_eq!(response.headers["vary"], "Origin");
    assert_eq!(response.headers["access-control-max-age"], "86400");
    assert!(app.identity.calls().is_empty());
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn test_missing_code_makes_no_upstream_calls() {
    let app = jane();

    for body in ["{}", r#"{"code":""}"#, r#"{"code":null,"extra":{}}"#, ""] {
        let response = app.post_exchange(body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(response.json(), json!({"error": "Missing code"}));
        assert_eq!(response.headers["access-control-allow-origin"], TEST_ORIGIN);
    }

    assert!(app.identity.calls().is_empty());
    assert_eq!(app.directory.finds(), 0);
    assert_eq!(app.directory.creates(), 0);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let app = jane();

    let response = app.post_exchange("{code: nope").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["error"], "Invalid JSON body");
    assert!(body["details"].is_string());
    assert!(app.identity.calls().is_empty());
}

#[tokio::test]
async fn test_body_without_content_type_is_accepted() {
    let app = jane();

    let response = app
        .send(
            Request::post("/exchange")
                .body(Body::from(r#"{"code":"4/0A"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
}

// ============================================================================
// Identity failures
// ============================================================================

#[tokio::test]
async fn test_google_exchange_failure_is_bad_request() {
    let app = TestApp::new(ScriptedIdentity::scripted(|| {
        Err(IdentityError::ExchangeFailed {
            status: 400,
            details: json!({"error": "invalid_grant", "error_description": "Bad Request"}),
        })
    }));

    let response = app.post_exchange(r#"{"code":"used"}"#).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json(),
        json!({
            "error": "Google exchange failed",
            "details": {"error": "invalid_grant", "error_description": "Bad Request"}
        })
    );
    assert_eq!(app.directory.finds(), 0);
}

#[tokio::test]
async fn test_missing_id_token_and_email() {
    let app = TestApp::new(ScriptedIdentity::scripted(|| {
        Err(IdentityError::MissingToken {
            details: json!({"access_token": "[REDACTED]"}),
        })
    }));
    let response = app.post_exchange(r#"{"code":"c"}"#).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "No id_token returned by Google");

    let app = TestApp::new(ScriptedIdentity::scripted(|| Err(IdentityError::MissingEmail)));
    let response = app.post_exchange(r#"{"code":"c"}"#).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "No email in id_token"}));
    assert_eq!(app.directory.customer_count(), 0);
}

#[tokio::test]
async fn test_invalid_token_is_bad_request() {
    let app = TestApp::new(ScriptedIdentity::scripted(|| {
        Err(IdentityError::InvalidToken(VerifyError::Issuer))
    }));

    let response = app.post_exchange(r#"{"code":"c"}"#).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "Invalid id_token");
}

#[tokio::test]
async fn test_upstream_timeout_is_gateway_timeout() {
    let app = TestApp::new(ScriptedIdentity::scripted(|| Err(IdentityError::Timeout)));

    let response = app.post_exchange(r#"{"code":"c"}"#).await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.json()["error"], "Upstream timeout");
    assert_eq!(response.headers["access-control-allow-origin"], TEST_ORIGIN);
}

// ============================================================================
// Customer sync
// ============================================================================

#[tokio::test]
async fn test_new_customer_is_created_then_reused() {
    let app = jane();

    let first = app.post_exchange(r#"{"code":"first"}"#).await;
    assert_eq!(first.status, StatusCode::OK);
    let first = first.json();
    assert_eq!(first["ok"], true);
    assert_eq!(first["email"], "jane@example.com");
    assert_eq!(first["firstName"], "Jane");
    assert_eq!(first["lastName"], "Doe");
    assert_eq!(first["exists"], false);
    assert_eq!(first["nextUrl"], "/account");

    let second = app.post_exchange(r#"{"code":"second"}"#).await.json();
    assert_eq!(second["exists"], true);
    assert_eq!(second["customerId"], first["customerId"]);

    assert_eq!(app.directory.customer_count(), 1);
    assert_eq!(app.directory.creates(), 1);
}

#[tokio::test]
async fn test_existing_customer_is_not_recreated() {
    let app = jane();
    let id = app.directory.insert("jane@example.com");

    let response = app.post_exchange(r#"{"code":"c"}"#).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["customerId"], id.as_str());
    assert_eq!(body["exists"], true);
    assert_eq!(app.directory.creates(), 0);
}

#[tokio::test]
async fn test_empty_names_are_omitted() {
    let app = TestApp::new(ScriptedIdentity::returning(claims("solo@example.com", "", "")));

    let body = app.post_exchange(r#"{"code":"c"}"#).await.json();

    assert!(body.get("firstName").is_none());
    assert!(body.get("lastName").is_none());
}

#[tokio::test]
async fn test_extras_are_stored_as_metadata() {
    let app = jane();

    app.post_exchange(r#"{"code":"c","extra":{"company":"Kiko Ltd","vat":" ","phone":"+44 20 7946 0000"}}"#)
        .await;

    let stored: Vec<_> = app
        .directory
        .metadata()
        .into_iter()
        .map(|e| (e.namespace, e.key, e.value))
        .collect();
    assert_eq!(
        stored,
        vec![
            ("profile".to_string(), "google_sub".to_string(), "110169484474386276334".to_string()),
            ("profile".to_string(), "signup_source".to_string(), "google".to_string()),
            ("profile".to_string(), "company".to_string(), "Kiko Ltd".to_string()),
            ("profile".to_string(), "phone".to_string(), "+44 20 7946 0000".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_numeric_extras_are_stored_as_text() {
    let app = jane();

    let response = app
        .post_exchange(r#"{"code":"c","extra":{"phone":5551234}}"#)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let phone: Vec<_> = app
        .directory
        .metadata()
        .into_iter()
        .filter(|e| e.key == "phone")
        .map(|e| e.value)
        .collect();
    assert_eq!(phone, vec!["5551234".to_string()]);
}

#[tokio::test]
async fn test_metadata_failure_still_succeeds() {
    let app = jane();
    app.directory.fail_metadata();

    let response = app.post_exchange(r#"{"code":"c","extra":{"vat":"GB123"}}"#).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["ok"], true);
    assert_eq!(app.directory.customer_count(), 1);
}

#[tokio::test]
async fn test_directory_validation_error_is_server_error() {
    let app = jane();
    app.directory.reject_create("Email contains an invalid domain name");

    let response = app.post_exchange(r#"{"code":"c"}"#).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json(),
        json!({"error": "Email contains an invalid domain name"})
    );
}

// ============================================================================
// Redirect URI
// ============================================================================

#[tokio::test]
async fn test_redirect_uri_defaults_to_popup_flow() {
    let app = jane();

    app.post_exchange(r#"{"code":"a"}"#).await;
    app.post_exchange(r#"{"code":"b","redirectUri":""}"#).await;
    app.post_exchange(r#"{"code":"c","redirectUri":"https://shop.example/callback"}"#)
        .await;

    assert_eq!(
        app.identity.calls(),
        vec![
            ("a".to_string(), "postmessage".to_string()),
            ("b".to_string(), "postmessage".to_string()),
            ("c".to_string(), "https://shop.example/callback".to_string()),
        ]
    );
}

// ============================================================================
// Ambient
// ============================================================================

#[tokio::test]
async fn test_health_and_not_found_carry_origin() {
    let app = jane();

    let health = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body, b"ok");
    assert_eq!(health.headers["access-control-allow-origin"], TEST_ORIGIN);

    let missing = app
        .send(Request::get("/nope").body(Body::empty()).unwrap())
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.headers["access-control-allow-origin"], TEST_ORIGIN);

    let wrong_method = app
        .send(Request::get("/exchange").body(Body::empty()).unwrap())
        .await;
    assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(wrong_method.headers["access-control-allow-origin"], TEST_ORIGIN);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = jane();

    let response = app
        .send(
            Request::post("/exchange")
                .header("x-request-id", "req-42")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.headers["x-request-id"], "req-42");
}
