//! HTTP surface of the auth service
//!
//! | Route | Auth | Purpose |
//! |-------|------|---------|
//! | `GET /.well-known/jwks.json` | none | public keys for verifiers |
//! | `POST /v1/auth/login` | HTTP Basic | exchange credentials for a token |
//! | `GET /v1/auth/whoami` | Bearer | echo the verified claims |
//! | `GET /health` | none | liveness |

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::context::AuthContext;
use crate::error::AuthError;
use crate::issuer::TokenIssuer;
use crate::jwt::{Claims, JwksPublisher, StaticKeyVerifier};
use crate::response::{error_response, unauthorized};
use crate::tower::AuthLayer;

/// JWKS route
pub const JWKS_PATH: &str = "/.well-known/jwks.json";
/// Login route
pub const LOGIN_PATH: &str = "/v1/auth/login";
/// Who-am-I route
pub const WHOAMI_PATH: &str = "/v1/auth/whoami";
/// Liveness route
pub const HEALTH_PATH: &str = "/health";

/// Shared state of the issuer routes
#[derive(Debug, Clone)]
pub struct IssuerState {
    issuer: Arc<TokenIssuer>,
    publisher: Arc<JwksPublisher>,
}

impl IssuerState {
    /// State serving `issuer`'s own public key
    pub fn new(issuer: TokenIssuer) -> Self {
        let publisher = issuer.publisher();
        Self {
            issuer: Arc::new(issuer),
            publisher: Arc::new(publisher),
        }
    }

    /// Publish a different key set, e.g. during rotation
    pub fn with_publisher(mut self, publisher: JwksPublisher) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    /// The issuer
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }
}

/// Body of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Signed token
    pub jwt: String,
}

/// Build the issuer router
///
/// `whoami` is verified against the issuer's own key, so the service does not
/// fetch its own JWKS.
///
/// # Errors
///
/// Returns [`AuthError::KeyMaterial`] if the signing key's public half is
/// rejected as a verification key.
pub fn router(state: IssuerState) -> crate::Result<Router> {
    let verifier = StaticKeyVerifier::from_signing_key(state.issuer.signing_key())?;

    Ok(Router::new()
        .route(JWKS_PATH, get(jwks))
        .route(LOGIN_PATH, post(login))
        .route(WHOAMI_PATH, get(whoami).layer(AuthLayer::new(verifier)))
        .route(HEALTH_PATH, get(health))
        .with_state(state))
}

async fn jwks(State(state): State<IssuerState>) -> impl IntoResponse {
    (
        [(CACHE_CONTROL, state.publisher.cache_control())],
        Json(state.publisher.jwks().clone()),
    )
}

async fn login(State(state): State<IssuerState>, headers: HeaderMap) -> Response {
    let Some((identifier, password)) = basic_credentials(&headers) else {
        return unauthorized(Some("missing required user/pass"), false);
    };

    match state.issuer.login(&identifier, &password).await {
        Ok(issued) => (StatusCode::OK, Json(LoginResponse { jwt: issued.token })).into_response(),
        Err(AuthError::InvalidCredentials) => unauthorized(None, false),
        Err(e) => {
            error!(error = %e, "login failed");
            error_response(e.status_code(), None)
        }
    }
}

async fn whoami(ctx: AuthContext) -> Json<Claims> {
    Json(ctx.into_claims())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Decode `Authorization: Basic base64(identifier:password)`
///
/// Returns `None` unless both parts are present and non-empty.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok().or_else(|| {
        warn!("undecodable basic credentials");
        None
    })?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (identifier, password) = decoded.split_once(':')?;

    if identifier.trim().is_empty() || password.is_empty() {
        return None;
    }
    Some((identifier.to_string(), password.to_string()))
}
