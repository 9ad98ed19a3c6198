//! Token issuance for the auth service

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::IssuerConfig;
use crate::error::{AuthError, Result};
use crate::jwt::codec::{self, TokenInput};
use crate::jwt::{Claims, JwksPublisher, SigningKey};
use crate::providers::{Clock, CredentialValidator, IdGenerator, SystemClock, UuidGenerator};

/// A freshly minted token and the claims it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Compact JWS
    pub token: String,
    /// Claims inside `token`
    pub claims: Claims,
}

/// Mints RS256 tokens for authenticated users
///
/// ```rust,no_run
/// # use autolog_auth::{IssuerConfig, TokenIssuer};
/// let config = IssuerConfig::new("/run/secrets/jwt.key", "/run/secrets/jwt.key.pub");
/// let issuer = TokenIssuer::from_config(&config)?;
/// let issued = issuer.issue_for_subject("42")?;
/// println!("{}", issued.token);
/// # Ok::<(), autolog_auth::AuthError>(())
/// ```
#[derive(Debug)]
pub struct TokenIssuer {
    issuer: String,
    token_ttl: chrono::Duration,
    signing_key: SigningKey,
    jwks_max_age: std::time::Duration,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    credentials: Option<Arc<dyn CredentialValidator>>,
}

impl TokenIssuer {
    /// Issuer using `signing_key`, the system clock and UUID v4 token ids
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] if the config is invalid.
    pub fn new(config: &IssuerConfig, signing_key: SigningKey) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            issuer: config.issuer.clone(),
            token_ttl: config.token_ttl(),
            signing_key,
            jwks_max_age: config.jwks_max_age(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            credentials: None,
        })
    }

    /// Issuer with the keypair loaded from the configured paths
    ///
    /// Startup fails if the public key on disk is not the private key's
    /// public half.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] for unreadable or mismatched keys
    /// and [`AuthError::InvalidArgument`] for an invalid config.
    pub fn from_config(config: &IssuerConfig) -> Result<Self> {
        config.validate()?;
        let signing_key = config.load_signing_key()?;
        Self::new(config, signing_key)
    }

    /// Override the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the token id source
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Enable [`login`](Self::login) against a user store
    pub fn with_credential_validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.credentials = Some(validator);
        self
    }

    /// `iss` stamped into every token
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Lifetime of every token
    pub fn token_ttl(&self) -> chrono::Duration {
        self.token_ttl
    }

    /// Signing key
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// JWKS publisher for this issuer's public key
    pub fn publisher(&self) -> JwksPublisher {
        JwksPublisher::from_signing_key(&self.signing_key).with_max_age(self.jwks_max_age)
    }

    /// Mint a token for `user_id`: `iat = nbf = now`, `exp = now + ttl`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] for a blank user id or an
    /// expiry past the representable range,
    /// [`AuthError::IdGeneration`] if no token id can be drawn, and
    /// [`AuthError::Signing`] if signing fails.
    pub fn issue_for_subject(&self, user_id: &str) -> Result<IssuedToken> {
        if user_id.trim().is_empty() {
            return Err(AuthError::InvalidArgument("user id must not be empty".to_string()));
        }

        let now = self.clock.now_utc();
        let expires_at = now.checked_add_signed(self.token_ttl).ok_or_else(|| {
            AuthError::InvalidArgument(format!(
                "token lifetime of {} minutes overflows the clock",
                self.token_ttl.num_minutes()
            ))
        })?;
        let input = TokenInput {
            issuer: self.issuer.clone(),
            subject: user_id.to_string(),
            token_id: self.ids.random_uuid()?,
            issued_at: now,
            not_before: now,
            expires_at,
        };
        let token = codec::issue(&input, &self.signing_key)?;

        info!(
            sub = %input.subject,
            jti = %input.token_id,
            exp = %input.expires_at,
            "issued token"
        );

        Ok(IssuedToken {
            claims: Claims {
                iss: input.issuer,
                sub: input.subject,
                exp: input.expires_at.timestamp(),
                nbf: input.not_before.timestamp(),
                iat: input.issued_at.timestamp(),
                jti: input.token_id,
            },
            token,
        })
    }

    /// Check credentials and mint a token for the matching user
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingConfiguration`] when no credential
    /// validator is wired, [`AuthError::InvalidArgument`] for blank input,
    /// [`AuthError::InvalidCredentials`] when the credentials do not match,
    /// and whatever the validator reports when the store fails.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<IssuedToken> {
        let validator = self
            .credentials
            .as_ref()
            .ok_or(AuthError::MissingConfiguration("credential validator"))?;

        if identifier.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidArgument(
                "identifier and password are required".to_string(),
            ));
        }

        match validator.validate_credentials(identifier, password).await? {
            Some(user_id) => self.issue_for_subject(&user_id),
            None => {
                warn!(identifier, "login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}
