//! Tower Service implementation for authentication
//!
//! Works with any `http::Request<B>` / `http::Response<ResBody>` pair whose
//! response body can be built from a `String`, which covers axum's `Body`.
//! Rejections are returned as `Ok` responses so the inner error type passes
//! through untouched.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::StatusCode;
use tower::Service;
use tracing::{debug, error, warn};

use super::{AuthLayerConfig, CallerMetadata, extract_bearer_token};
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::jwt::{TokenVerifier, Verification};
use crate::response::{error_response, unauthorized};

/// Tower Service that performs authentication
///
/// Extracts the bearer token, verifies it with the configured
/// [`TokenVerifier`], and inserts an [`AuthContext`] into the request's
/// extensions before forwarding to the inner service.
///
/// # Type Parameters
///
/// * `S` - The inner service type
/// * `V` - The token verifier type
#[derive(Debug)]
pub struct AuthService<S, V> {
    inner: S,
    verifier: Arc<V>,
    config: AuthLayerConfig,
}

impl<S: Clone, V> Clone for AuthService<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            verifier: Arc::clone(&self.verifier),
            config: self.config.clone(),
        }
    }
}

impl<S, V> AuthService<S, V> {
    /// Create a new auth service
    pub fn new(inner: S, verifier: Arc<V>, config: AuthLayerConfig) -> Self {
        Self {
            inner,
            verifier,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Get the verifier
    pub fn verifier(&self) -> &Arc<V> {
        &self.verifier
    }
}

/// Future type for auth service responses
pub type AuthServiceFuture<T, E> = BoxFuture<'static, Result<T, E>>;

impl<S, V, B, ResBody> Service<http::Request<B>> for AuthService<S, V>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    V: TokenVerifier + 'static,
    B: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = AuthServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let verifier = Arc::clone(&self.verifier);

        Box::pin(async move {
            let caller = CallerMetadata::from_headers(req.headers());
            let path = req.uri().path().to_string();

            let token = match extract_bearer_token(req.headers()) {
                Ok(token) => token.to_string(),
                Err(e) => {
                    warn!(
                        path = %path,
                        referer = %caller.referer,
                        user_agent = %caller.user_agent,
                        forwarded_for = %caller.forwarded_for,
                        error = %e,
                        "rejecting request without bearer token"
                    );
                    return Ok(unauthorized(None, false));
                }
            };

            match verifier.verify_token(&token).await {
                Ok(Verification::Valid(claims)) => {
                    debug!(path = %path, sub = %claims.sub, jti = %claims.jti, "request authenticated");
                    req.extensions_mut().insert(AuthContext::new(claims));
                    inner.call(req).await
                }
                Ok(Verification::Invalid { claims, reason }) => {
                    warn!(
                        path = %path,
                        referer = %caller.referer,
                        user_agent = %caller.user_agent,
                        forwarded_for = %caller.forwarded_for,
                        sub = %claims.sub,
                        jti = %claims.jti,
                        reason = %reason,
                        "rejecting invalid token"
                    );
                    Ok(unauthorized(None, true))
                }
                Err(e) => Ok(reject(&e, &path, &caller)),
            }
        })
    }
}

fn reject<ResBody: From<String>>(
    err: &AuthError,
    path: &str,
    caller: &CallerMetadata,
) -> http::Response<ResBody> {
    if err.is_client_error() {
        warn!(
            path,
            referer = %caller.referer,
            user_agent = %caller.user_agent,
            forwarded_for = %caller.forwarded_for,
            error = %err,
            "rejecting bearer token"
        );
        unauthorized(err.public_message(), true)
    } else {
        error!(
            path,
            referer = %caller.referer,
            user_agent = %caller.user_agent,
            forwarded_for = %caller.forwarded_for,
            error = %err,
            "token verification failed"
        );
        error_response(StatusCode::INTERNAL_SERVER_ERROR, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use http::header::AUTHORIZATION;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Verifier that answers with a canned outcome
    #[derive(Debug)]
    struct Canned(fn() -> Result<Verification>);

    #[async_trait]
    impl TokenVerifier for Canned {
        async fn verify_token(&self, _token: &str) -> Result<Verification> {
            (self.0)()
        }
    }

    /// Verifier that accepts everything and counts how often it was asked
    #[derive(Debug, Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl TokenVerifier for Counting {
        async fn verify_token(&self, _token: &str) -> Result<Verification> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Verification::Valid(claims()))
        }
    }

    fn claims() -> crate::jwt::Claims {
        crate::jwt::Claims {
            iss: "auth-api".into(),
            sub: "5".into(),
            exp: i64::MAX,
            nbf: 0,
            iat: 0,
            jti: "j".into(),
        }
    }

    async fn echo_user(
        req: http::Request<String>,
    ) -> std::result::Result<http::Response<String>, Infallible> {
        let user = AuthContext::from_extensions(req.extensions())
            .map(|ctx| ctx.user_id().to_string())
            .unwrap_or_default();
        Ok(http::Response::new(user))
    }

    async fn call(verifier: Canned, auth: Option<&str>) -> http::Response<String> {
        let service = AuthService::new(
            tower::service_fn(echo_user),
            Arc::new(verifier),
            AuthLayerConfig::default().bypass_path("/health"),
        );
        let mut builder = http::Request::builder().uri("/v1/vehicles");
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        service
            .oneshot(builder.body(String::new()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_reaches_inner_with_context() {
        let response = call(Canned(|| Ok(Verification::Valid(claims()))), Some("Bearer t")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "5");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = call(Canned(|| Ok(Verification::Valid(claims()))), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.body().contains("errorMessage"));
    }

    #[tokio::test]
    async fn test_expired_token_message() {
        let response = call(Canned(|| Err(AuthError::TokenExpired)), Some("Bearer t")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.body().contains(r#""errorMessage":"token expired""#));
    }

    #[tokio::test]
    async fn test_invalid_outcome_is_unauthorized() {
        let response = call(
            Canned(|| {
                Ok(Verification::Invalid {
                    claims: claims(),
                    reason: crate::jwt::InvalidReason::NotYetValid,
                })
            }),
            Some("Bearer t"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[http::header::WWW_AUTHENTICATE],
            r#"Bearer error="invalid_token""#
        );
    }

    #[tokio::test]
    async fn test_key_source_failure_is_server_error() {
        let response = call(
            Canned(|| Err(AuthError::jwks_fetch("http://auth/jwks", "connection refused"))),
            Some("Bearer t"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.body().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_bypass_path_skips_verification() {
        let service = AuthService::new(
            tower::service_fn(echo_user),
            Arc::new(Canned(|| Err(AuthError::InvalidSignature))),
            AuthLayerConfig::default().bypass_path("/health"),
        );
        let req = http::Request::builder().uri("/health").body(String::new()).unwrap();
        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "");
    }

    #[tokio::test]
    async fn test_non_bearer_schemes_never_reach_verifier() {
        let verifier = Arc::new(Counting::default());
        let service = AuthService::new(
            tower::service_fn(echo_user),
            Arc::clone(&verifier),
            AuthLayerConfig::default(),
        );

        for auth in ["Basic xyz", "bearer t", "Bearer", "Bearer a b", "Token t", "   "] {
            let req = http::Request::builder()
                .uri("/v1/vehicles")
                .header(AUTHORIZATION, auth)
                .body(String::new())
                .unwrap();
            let response = service.clone().oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{auth:?}");
            assert_eq!(
                response.headers()[http::header::WWW_AUTHENTICATE],
                "Bearer",
                "{auth:?}"
            );
        }
        assert_eq!(verifier.0.load(Ordering::SeqCst), 0);

        let req = http::Request::builder()
            .uri("/v1/vehicles")
            .header(AUTHORIZATION, "Bearer t")
            .body(String::new())
            .unwrap();
        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(verifier.0.load(Ordering::SeqCst), 1);
    }
}
