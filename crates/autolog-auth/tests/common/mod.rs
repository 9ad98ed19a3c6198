//! Common test utilities for integration tests
//!
//! Key generation, a mock JWKS endpoint and an in-memory credential store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use autolog_auth::jwt::{JwkSet, SigningKey};
use autolog_auth::providers::{CredentialValidator, FixedClock};
use autolog_auth::{AuthError, IssuerConfig, Result, TokenIssuer};
use chrono::{DateTime, TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// RSA keypair in PEM form
pub struct TestKeyPair {
    pub private_pem: Vec<u8>,
    pub public_pem: Vec<u8>,
}

impl TestKeyPair {
    pub fn signing_key(&self, kid: &str) -> SigningKey {
        SigningKey::from_pem(kid, &self.private_pem, &self.public_pem).expect("signing key")
    }
}

/// Generate a test RSA key pair (PEM format) for testing
pub fn generate_test_rsa_keypair() -> TestKeyPair {
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
    let public_key = private_key.to_public_key();

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("Failed to encode private key")
        .as_bytes()
        .to_vec();
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .expect("Failed to encode public key")
        .into_bytes();

    TestKeyPair {
        private_pem,
        public_pem,
    }
}

/// A fixed instant the tests pin clocks to
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
}

/// Issuer on a fixed clock
pub fn issuer_at(key: SigningKey, clock: Arc<FixedClock>) -> TokenIssuer {
    TokenIssuer::new(&IssuerConfig::default(), key)
        .expect("issuer")
        .with_clock(clock)
}

/// JWKS document for the given signing keys
pub fn jwks_for(keys: &[&SigningKey]) -> JwkSet {
    JwkSet {
        keys: keys.iter().map(|k| k.public_jwk()).collect(),
    }
}

/// Mock JWKS server
pub struct MockJwksServer {
    pub server: MockServer,
    pub jwks_url: String,
}

impl MockJwksServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_url = format!("{}{}", server.uri(), JWKS_PATH);
        Self { server, jwks_url }
    }

    /// Serve `jwks` until reset
    pub async fn serve(&self, jwks: &JwkSet) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&self.server)
            .await;
    }

    /// Serve `jwks` for exactly `times` requests
    pub async fn serve_times(&self, jwks: &JwkSet, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Answer every request with `status`
    pub async fn fail_with(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer every request with a body that is not a JWKS
    pub async fn serve_garbage(&self) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&self.server)
            .await;
    }

    pub async fn reset(&self) {
        self.server.reset().await;
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or_default()
    }
}

/// In-memory credential store: identifier -> (password, user id)
#[derive(Debug, Default)]
pub struct InMemoryCredentials {
    users: HashMap<String, (String, String)>,
    broken: bool,
}

impl InMemoryCredentials {
    pub fn with_user(mut self, identifier: &str, password: &str, user_id: &str) -> Self {
        self.users
            .insert(identifier.to_string(), (password.to_string(), user_id.to_string()));
        self
    }

    /// A store whose backend is down
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CredentialValidator for InMemoryCredentials {
    async fn validate_credentials(&self, identifier: &str, password: &str) -> Result<Option<String>> {
        if self.broken {
            return Err(AuthError::Credentials("user store unavailable".to_string()));
        }
        Ok(self
            .users
            .get(identifier)
            .filter(|(stored, _)| stored == password)
            .map(|(_, user_id)| user_id.clone()))
    }
}
