//! Token verifiers
//!
//! [`TokenVerifier`] is the seam the middleware depends on. Two
//! implementations ship:
//!
//! - [`StaticKeyVerifier`] - one known public key, used by the issuer itself
//! - [`JwksVerifier`] - keys fetched from the issuer's JWKS endpoint and
//!   selected by the token's `kid`, used by every other service

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use tracing::{debug, info};

use super::codec::{self, Verification, VerifyOptions};
use super::jwks::JwksClient;
use super::keys::{SigningKey, parse_public_key_pem};
use super::public_key_to_jwk;
use crate::config::VerifierConfig;
use crate::error::{AuthError, Result};
use crate::providers::{Clock, SystemClock};

/// Verifies bearer tokens
#[async_trait]
pub trait TokenVerifier: Send + Sync + std::fmt::Debug {
    /// Verify `token`
    ///
    /// # Errors
    ///
    /// Client errors ([`AuthError::is_client_error`]) for tokens that are
    /// malformed, forged, expired or signed by an unknown key; server errors
    /// when the key source itself fails.
    async fn verify_token(&self, token: &str) -> Result<Verification>;
}

#[async_trait]
impl<V: TokenVerifier + ?Sized> TokenVerifier for Arc<V> {
    async fn verify_token(&self, token: &str) -> Result<Verification> {
        (**self).verify_token(token).await
    }
}

/// Verifier bound to a single public key
///
/// The token's `kid` is not consulted.
pub struct StaticKeyVerifier {
    key: DecodingKey,
    options: VerifyOptions,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for StaticKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyVerifier")
            .field("options", &self.options)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl StaticKeyVerifier {
    /// Verifier for a PEM public key
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if the PEM is not an RSA public key.
    pub fn from_public_key_pem(pem: &[u8]) -> Result<Self> {
        let public_key = parse_public_key_pem(pem)?;
        let key = public_key_to_jwk("", &public_key).to_decoding_key()?;
        Ok(Self::new(key))
    }

    /// Verifier for tokens signed by `key`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if the public components are rejected.
    pub fn from_signing_key(key: &SigningKey) -> Result<Self> {
        Ok(Self::new(key.decoding_key()?))
    }

    /// Verifier for an already decoded key
    pub fn new(key: DecodingKey) -> Self {
        Self {
            key,
            options: VerifyOptions::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Override claim checks
    pub fn with_options(mut self, options: VerifyOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticKeyVerifier {
    async fn verify_token(&self, token: &str) -> Result<Verification> {
        codec::verify(token, &self.key, &self.options, self.clock.now_utc())
    }
}

/// Verifier that resolves keys through the issuer's JWKS
///
/// Construction fetches the key set once and fails if it cannot; after that,
/// fetch failures fall back to the last keys that were fetched successfully.
#[derive(Debug)]
pub struct JwksVerifier {
    client: JwksClient,
    options: VerifyOptions,
    clock: Arc<dyn Clock>,
}

impl JwksVerifier {
    /// Build the verifier and fetch the initial key set
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the endpoint is
    /// unreachable or answers non-2xx, or the document holds no usable key.
    pub async fn connect(config: VerifierConfig) -> Result<Self> {
        let client = JwksClient::new(&config)?;
        let jwks = client.refresh().await?;
        info!(
            jwks_uri = %client.jwks_uri(),
            key_count = jwks.keys.len(),
            "JWKS verifier ready"
        );

        Ok(Self {
            client,
            options: config.verify_options(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Override the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying JWKS client
    pub fn client(&self) -> &JwksClient {
        &self.client
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify_token(&self, token: &str) -> Result<Verification> {
        let kid = codec::decode_key_id(token)?.ok_or_else(|| {
            debug!("token header has no kid");
            AuthError::MalformedToken("token header has no kid".to_string())
        })?;
        let key = self.client.decoding_key(&kid).await?;
        codec::verify(token, &key, &self.options, self.clock.now_utc())
    }
}
