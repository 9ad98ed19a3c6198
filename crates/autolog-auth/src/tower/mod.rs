//! # Tower middleware for bearer-token authentication
//!
//! - [`AuthLayer`] - wraps services with authentication
//! - [`AuthService`] - extracts the bearer token, verifies it, and either
//!   forwards the request with an [`AuthContext`](crate::AuthContext)
//!   extension or answers with a JSON error
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use autolog_auth::tower::AuthLayer;
//!
//! let verifier = JwksVerifier::connect(config).await?;
//! let app = Router::new()
//!     .route("/v1/vehicles", get(list_vehicles))
//!     .layer(AuthLayer::new(verifier));
//! ```
//!
//! ## Responses
//!
//! | Outcome | Status | `errorMessage` |
//! |---------|--------|----------------|
//! | missing or malformed `Authorization` | 401 | - |
//! | expired token | 401 | `token expired` |
//! | bad signature, unknown kid, not yet valid | 401 | - |
//! | key source failure | 500 | - |

mod layer;
mod service;

pub use layer::AuthLayer;
pub use service::{AuthService, AuthServiceFuture};

use http::HeaderMap;
use http::header::AUTHORIZATION;

use crate::error::{AuthError, Result};

/// Configuration for the auth layer
#[derive(Debug, Clone, Default)]
pub struct AuthLayerConfig {
    /// Request paths served without authentication (exact match)
    pub bypass_paths: Vec<String>,
}

impl AuthLayerConfig {
    /// Add a path to the bypass list
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.push(path.into());
        self
    }

    /// Check if a path should bypass authentication
    pub fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }
}

/// Extract the token from `Authorization: Bearer <token>`
///
/// The header must split on a single space into exactly two parts: the
/// literal `Bearer` and a non-empty token.
///
/// # Errors
///
/// Returns [`AuthError::MissingAuthorization`] when the header is absent or
/// blank and [`AuthError::MalformedHeader`] for any other shape.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    if value.trim().is_empty() {
        return Err(AuthError::MissingAuthorization);
    }

    match value.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(*token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Caller details logged with every rejection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CallerMetadata {
    pub referer: String,
    pub user_agent: String,
    pub forwarded_for: String,
}

impl CallerMetadata {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            referer: header("referer"),
            user_agent: header("user-agent"),
            forwarded_for: header("x-forwarded-for"),
        }
    }
}
