//! # autolog-auth - Token Authentication for the autolog Services
//!
//! The auth service mints RS256-signed JWTs and publishes its public key as a
//! JWKS document. Every other service verifies tokens against that document,
//! fetched once and cached, without calling the auth service per request.
//!
//! ## Architecture
//!
//! - [`jwt`] - claims, key material, RS256 codec, JWKS documents and client,
//!   and the [`TokenVerifier`] implementations
//! - [`issuer`] - [`TokenIssuer`], which mints tokens for a user id or a login
//! - [`tower`] - [`AuthLayer`](tower::AuthLayer), bearer-token middleware for
//!   any tower/axum service
//! - [`context`] - [`AuthContext`], the verified identity attached to requests
//! - [`server`] - axum routes of the auth service (JWKS, login, whoami)
//! - [`providers`] - injected clock, id generator and credential validator
//! - [`config`] - issuer and verifier settings
//! - [`error`] - [`AuthError`] and its 401/500 classification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autolog_auth::tower::AuthLayer;
//! use autolog_auth::{JwksVerifier, VerifierConfig};
//!
//! # async fn run() -> Result<(), autolog_auth::AuthError> {
//! let config = VerifierConfig::new("http://auth-api:8080/.well-known/jwks.json");
//! let verifier = JwksVerifier::connect(config).await?;
//!
//! let app: axum::Router = axum::Router::new()
//!     .route("/v1/vehicles", axum::routing::get(|| async { "[]" }))
//!     .layer(AuthLayer::new(verifier));
//! # Ok(())
//! # }
//! ```
//!
//! ## Standards
//!
//! - **RFC 7515** - JSON Web Signature (RS256)
//! - **RFC 7517** - JSON Web Key
//! - **RFC 7519** - JSON Web Token
//! - **RFC 6750** - Bearer token usage

pub mod config;
pub mod context;
pub mod error;
pub mod issuer;
pub mod jwt;
pub mod providers;
pub mod response;
pub mod server;
pub mod tower;

#[cfg(test)]
mod test_keys;

#[doc(inline)]
pub use config::{IssuerConfig, VerifierConfig};

#[doc(inline)]
pub use context::AuthContext;

#[doc(inline)]
pub use error::{AuthError, Result};

#[doc(inline)]
pub use issuer::{IssuedToken, TokenIssuer};

#[doc(inline)]
pub use jwt::{
    Claims, JwksClient, JwksPublisher, JwksVerifier, SigningKey, StaticKeyVerifier, TokenVerifier,
    Verification,
};

#[doc(inline)]
pub use providers::{Clock, CredentialValidator, IdGenerator, SystemClock, UuidGenerator};
