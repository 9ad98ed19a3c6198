//! Bearer middleware in front of an axum service, keys resolved through JWKS

mod common;

use std::sync::Arc;

use autolog_auth::providers::FixedClock;
use autolog_auth::response::ErrorResponse;
use autolog_auth::tower::AuthLayer;
use autolog_auth::{AuthContext, JwksVerifier, TokenIssuer, VerifierConfig};
use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use common::{MockJwksServer, epoch, generate_test_rsa_keypair, issuer_at, jwks_for};
use tower::ServiceExt;

struct Harness {
    app: Router,
    issuer: TokenIssuer,
    clock: Arc<FixedClock>,
    _jwks: MockJwksServer,
}

async fn vehicles(ctx: AuthContext) -> String {
    format!("vehicles of {}", ctx.user_id())
}

async fn harness() -> Harness {
    let key = generate_test_rsa_keypair().signing_key("autolog-public-key");
    let jwks = MockJwksServer::start().await;
    jwks.serve(&jwks_for(&[&key])).await;

    let clock = Arc::new(FixedClock::new(epoch()));
    let verifier = JwksVerifier::connect(VerifierConfig::new(&jwks.jwks_url))
        .await
        .unwrap()
        .with_clock(clock.clone());

    let app = Router::new()
        .route("/v1/vehicles", get(vehicles))
        .route("/health", get(|| async { "ok" }))
        .layer(AuthLayer::new(verifier).bypass_path("/health"));

    Harness {
        app,
        issuer: issuer_at(key, clock.clone()),
        clock,
        _jwks: jwks,
    }
}

async fn send(app: &Router, uri: &str, authorization: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(value) = authorization {
        request = request.header(AUTHORIZATION, value);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn error_body(response: Response) -> ErrorResponse {
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let h = harness().await;
    let token = h.issuer.issue_for_subject("31").unwrap().token;

    let response = send(&h.app, "/v1/vehicles", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "vehicles of 31");
}

#[tokio::test]
async fn test_missing_header_rejected() {
    let h = harness().await;
    let response = send(&h.app, "/v1/vehicles", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    let body = error_body(response).await;
    assert_eq!(body.status_code, 401);
    assert_eq!(body.error_message, None);
}

#[tokio::test]
async fn test_non_bearer_schemes_rejected() {
    let h = harness().await;
    let token = h.issuer.issue_for_subject("31").unwrap().token;

    for value in [
        "Basic YWRhOnNlY3JldA==".to_string(),
        format!("bearer {token}"),
        format!("Bearer {token} extra"),
        "Bearer ".to_string(),
    ] {
        let response = send(&h.app, "/v1/vehicles", Some(&value)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value}");
    }
}

#[tokio::test]
async fn test_expired_token_gets_message() {
    let h = harness().await;
    let token = h.issuer.issue_for_subject("31").unwrap().token;
    h.clock.advance(chrono::Duration::minutes(31));

    let response = send(&h.app, "/v1/vehicles", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        error_body(response).await.error_message.as_deref(),
        Some("token expired")
    );
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let h = harness().await;
    let response = send(&h.app, "/v1/vehicles", Some("Bearer not.a.jwt")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[WWW_AUTHENTICATE],
        r#"Bearer error="invalid_token""#
    );
    assert_eq!(error_body(response).await.error_message, None);
}

#[tokio::test]
async fn test_token_from_other_issuer_key_is_unauthorized() {
    let h = harness().await;
    let stranger = issuer_at(
        generate_test_rsa_keypair().signing_key("someone-else"),
        h.clock.clone(),
    );
    let token = stranger.issue_for_subject("31").unwrap().token;

    let response = send(&h.app, "/v1/vehicles", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bypass_path_needs_no_token() {
    let h = harness().await;
    let response = send(&h.app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
