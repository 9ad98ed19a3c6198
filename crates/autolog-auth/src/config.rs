//! Issuer and verifier configuration
//!
//! Both structs deserialize from any serde source with every field defaulted,
//! so a deployment only names what it changes. Durations are carried as whole
//! seconds (minutes for the token lifetime, matching `JWT_EXPIRY_LENGTH_MINUTES`).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::jwt::{DEFAULT_KEY_ID, SigningKey, VerifyOptions};

/// Default token lifetime in minutes
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// Default `iss` claim
pub const DEFAULT_ISSUER: &str = "auth-api";

/// Longest accepted token lifetime, one year
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Token issuer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Value of the `iss` claim
    pub issuer: String,
    /// Token lifetime in minutes
    pub token_ttl_minutes: i64,
    /// PEM private key path
    pub private_key_path: PathBuf,
    /// PEM public key path
    pub public_key_path: PathBuf,
    /// Key id published in the JWKS and stamped into token headers
    pub key_id: String,
    /// `Cache-Control: max-age` of the JWKS endpoint, seconds
    pub jwks_max_age_secs: u64,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            private_key_path: PathBuf::from("jwt.key"),
            public_key_path: PathBuf::from("jwt.key.pub"),
            key_id: DEFAULT_KEY_ID.to_string(),
            jwks_max_age_secs: 300,
        }
    }
}

impl IssuerConfig {
    /// Config reading the keypair from the given paths
    pub fn new(private_key_path: impl Into<PathBuf>, public_key_path: impl Into<PathBuf>) -> Self {
        Self {
            private_key_path: private_key_path.into(),
            public_key_path: public_key_path.into(),
            ..Self::default()
        }
    }

    /// Set the `iss` claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the token lifetime in minutes
    pub fn with_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.token_ttl_minutes = minutes;
        self
    }

    /// Set the key id
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    /// Token lifetime
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.token_ttl_minutes).unwrap_or(chrono::Duration::MAX)
    }

    /// JWKS cache lifetime advertised to clients
    pub fn jwks_max_age(&self) -> Duration {
        Duration::from_secs(self.jwks_max_age_secs)
    }

    /// Check the settings without touching the filesystem
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] for a blank issuer or key id, or
    /// a non-positive lifetime.
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::InvalidArgument("issuer must not be empty".to_string()));
        }
        if self.key_id.trim().is_empty() {
            return Err(AuthError::InvalidArgument("key id must not be empty".to_string()));
        }
        if self.token_ttl_minutes <= 0 {
            return Err(AuthError::InvalidArgument(format!(
                "token lifetime must be positive, got {} minutes",
                self.token_ttl_minutes
            )));
        }
        if self.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            return Err(AuthError::InvalidArgument(format!(
                "token lifetime must be at most {MAX_TOKEN_TTL_MINUTES} minutes, got {}",
                self.token_ttl_minutes
            )));
        }
        Ok(())
    }

    /// Load and cross-check the configured keypair
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if a file is unreadable, unparseable,
    /// or the public key does not belong to the private key.
    pub fn load_signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_files(&self.key_id, &self.private_key_path, &self.public_key_path)
    }
}

/// JWKS-backed verifier settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Issuer's JWKS endpoint
    pub jwks_url: String,
    /// Age after which cached keys are refreshed, seconds
    pub cache_ttl_secs: u64,
    /// Minimum spacing between refreshes, seconds
    pub min_refresh_interval_secs: u64,
    /// Bound on a single JWKS fetch, seconds
    pub fetch_timeout_secs: u64,
    /// Clock skew tolerated on `exp` and `nbf`, seconds
    pub leeway_secs: u64,
    /// Reject tokens whose `iss` differs, when set
    pub expected_issuer: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            jwks_url: String::new(),
            cache_ttl_secs: 600,
            min_refresh_interval_secs: 5,
            fetch_timeout_secs: 10,
            leeway_secs: 0,
            expected_issuer: None,
        }
    }
}

impl VerifierConfig {
    /// Config for the given JWKS endpoint
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            ..Self::default()
        }
    }

    /// Set the cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the minimum refresh interval
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval_secs = interval.as_secs();
        self
    }

    /// Set the fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the clock-skew leeway
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = leeway.as_secs();
        self
    }

    /// Require this `iss`
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Cache TTL
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Minimum refresh interval
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }

    /// Fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Claim checks derived from this config
    pub fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            leeway: Duration::from_secs(self.leeway_secs),
            expected_issuer: self.expected_issuer.clone(),
        }
    }

    /// Check the settings
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingConfiguration`] without a JWKS URL and
    /// [`AuthError::InvalidArgument`] for a non-HTTP(S) URL or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.jwks_url.trim().is_empty() {
            return Err(AuthError::MissingConfiguration("JWKS URL"));
        }
        let url = reqwest::Url::parse(&self.jwks_url).map_err(|e| {
            AuthError::InvalidArgument(format!("invalid JWKS URL '{}': {e}", self.jwks_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AuthError::InvalidArgument(format!(
                "JWKS URL must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(AuthError::InvalidArgument(
                "fetch timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
