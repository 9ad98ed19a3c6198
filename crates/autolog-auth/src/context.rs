//! Per-request authentication context
//!
//! The middleware inserts an [`AuthContext`] into the request extensions once
//! a token verifies. Handlers read it from there, or take it as an axum
//! extractor.

use axum::extract::FromRequestParts;
use axum::response::Response;
use chrono::{DateTime, Utc};
use http::StatusCode;
use http::request::Parts;
use tracing::warn;

use crate::jwt::Claims;
use crate::response::error_response;

/// Verified identity of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    claims: Claims,
}

impl AuthContext {
    /// Wrap verified claims
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    /// Authenticated user id (`sub`)
    pub fn user_id(&self) -> &str {
        self.claims.user_id()
    }

    /// Token id (`jti`)
    pub fn token_id(&self) -> &str {
        &self.claims.jti
    }

    /// Token expiry
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }

    /// Verified claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Take the claims
    pub fn into_claims(self) -> Claims {
        self.claims
    }

    /// Context attached to a request, if it passed the middleware
    pub fn from_extensions(extensions: &http::Extensions) -> Option<&Self> {
        extensions.get::<Self>()
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            warn!(path = %parts.uri.path(), "handler requires auth but no context on request");
            error_response(StatusCode::UNAUTHORIZED, None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            iss: "auth-api".into(),
            sub: "99".into(),
            exp: 2_000,
            nbf: 1_000,
            iat: 1_000,
            jti: "jti-99".into(),
        }
    }

    #[test]
    fn test_accessors() {
        let ctx = AuthContext::new(claims());
        assert_eq!(ctx.user_id(), "99");
        assert_eq!(ctx.token_id(), "jti-99");
        assert_eq!(ctx.expires_at().timestamp(), 2_000);
        assert_eq!(ctx.into_claims(), claims());
    }

    #[tokio::test]
    async fn test_extractor_reads_extension() {
        let mut req = http::Request::new(());
        req.extensions_mut().insert(AuthContext::new(claims()));
        let (mut parts, ()) = req.into_parts();

        let ctx = AuthContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.user_id(), "99");
        assert!(AuthContext::from_extensions(&parts.extensions).is_some());
    }

    #[tokio::test]
    async fn test_extractor_rejects_without_extension() {
        let (mut parts, ()) = http::Request::new(()).into_parts();
        let rejection = AuthContext::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }
}
