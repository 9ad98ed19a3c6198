//! JWKS (JSON Web Key Set) documents, publishing, fetching and caching
//!
//! The issuer publishes its public key as a one-entry [`JwkSet`] through a
//! [`JwksPublisher`]. Verifying services hold a [`JwksClient`] that fetches
//! that document and caches the decoded keys:
//!
//! - **TTL-based caching**: entries older than `cache_ttl` are refreshed on
//!   the next lookup
//! - **Refresh on unknown kid**: one refresh, then the lookup fails
//! - **Rate limiting**: refreshes closer than `min_refresh_interval` reuse the
//!   cache
//! - **Single-flight**: concurrent refreshes collapse into one fetch; a stale
//!   lookup that finds a fetch already running serves the stale keys
//! - **Last-known-good**: a failed refresh keeps serving the previous keys
//!
//! The key set is swapped as a whole, so a reader sees either the old or the
//! new set, never a partial one.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::DecodingKey;
use rsa::RsaPublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use super::keys::{SigningKey, parse_public_key_pem};
use crate::config::VerifierConfig;
use crate::error::{AuthError, Result};

const KEY_TYPE_RSA: &str = "RSA";
const KEY_USE_SIGNATURE: &str = "sig";
const ALGORITHM_RS256: &str = "RS256";

/// A single JSON Web Key (RFC 7517)
///
/// Only RSA signing keys are usable here; other members of a foreign key set
/// still parse so one exotic entry does not poison the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, `RSA` for every key this crate publishes
    pub kty: String,
    /// Intended use, `sig`
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm, `RS256`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key id matched against token headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// RSA modulus, base64url without padding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url without padding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// X.509 certificate chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
    /// X.509 SHA-1 thumbprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,
}

impl Jwk {
    /// Convert to a verification key
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if this is not an RS256 signing key
    /// or its components do not decode.
    pub fn to_decoding_key(&self) -> Result<DecodingKey> {
        if self.kty != KEY_TYPE_RSA {
            return Err(AuthError::KeyMaterial(format!(
                "unsupported key type '{}'",
                self.kty
            )));
        }
        if let Some(key_use) = &self.key_use
            && key_use != KEY_USE_SIGNATURE
        {
            return Err(AuthError::KeyMaterial(format!(
                "key use '{key_use}' is not a signing key"
            )));
        }
        if let Some(alg) = &self.alg
            && alg != ALGORITHM_RS256
        {
            return Err(AuthError::KeyMaterial(format!("unsupported algorithm '{alg}'")));
        }
        let (Some(n), Some(e)) = (&self.n, &self.e) else {
            return Err(AuthError::KeyMaterial(
                "RSA key is missing modulus or exponent".to_string(),
            ));
        };

        DecodingKey::from_rsa_components(n, e)
            .map_err(|err| AuthError::KeyMaterial(format!("invalid RSA components: {err}")))
    }
}

/// Convert an RSA public key into its JWK form under `kid`
///
/// Output is deterministic for a given key and kid.
pub fn public_key_to_jwk(kid: &str, key: &RsaPublicKey) -> Jwk {
    Jwk {
        kty: KEY_TYPE_RSA.to_string(),
        key_use: Some(KEY_USE_SIGNATURE.to_string()),
        alg: Some(ALGORITHM_RS256.to_string()),
        kid: Some(kid.to_string()),
        n: Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be())),
        e: Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be())),
        x5c: None,
        x5t: None,
    }
}

/// A JWK Set document: `{"keys": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a key by id
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
    }

    /// Decode every usable key, indexed by kid
    ///
    /// Keys without a kid, non-RS256 keys and duplicate kids are skipped.
    pub fn decoding_keys(&self) -> HashMap<String, Arc<DecodingKey>> {
        let mut keys = HashMap::with_capacity(self.keys.len());
        for jwk in &self.keys {
            let Some(kid) = jwk.kid.as_deref() else {
                debug!(kty = %jwk.kty, "skipping JWK without kid");
                continue;
            };
            let key = match jwk.to_decoding_key() {
                Ok(key) => key,
                Err(e) => {
                    debug!(kid, error = %e, "skipping unusable JWK");
                    continue;
                }
            };
            match keys.entry(kid.to_string()) {
                Entry::Occupied(_) => warn!(kid, "duplicate kid in JWKS, keeping first"),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(key));
                }
            }
        }
        keys
    }
}

/// Serves the issuer's public keys
#[derive(Debug, Clone)]
pub struct JwksPublisher {
    jwks: JwkSet,
    max_age: Duration,
}

impl JwksPublisher {
    /// Default `Cache-Control: max-age` for the published document
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

    /// Publish `keys`, e.g. the current key plus one being rotated out
    pub fn new(keys: impl IntoIterator<Item = Jwk>) -> Self {
        Self {
            jwks: JwkSet {
                keys: keys.into_iter().collect(),
            },
            max_age: Self::DEFAULT_MAX_AGE,
        }
    }

    /// Publish the public half of the issuer's signing key
    pub fn from_signing_key(key: &SigningKey) -> Self {
        Self::new([key.public_jwk()])
    }

    /// Publish a PEM public key under `kid`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if the PEM is not an RSA public key.
    pub fn from_public_key_pem(kid: &str, pem: &[u8]) -> Result<Self> {
        let key = parse_public_key_pem(pem)?;
        Ok(Self::new([public_key_to_jwk(kid, &key)]))
    }

    /// Override the cache lifetime advertised to clients
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// The published document
    pub fn jwks(&self) -> &JwkSet {
        &self.jwks
    }

    /// The published document as JSON
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.jwks)
            .map_err(|e| AuthError::KeyMaterial(format!("cannot serialize JWKS: {e}")))
    }

    /// `Cache-Control` header value for the JWKS endpoint
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.max_age.as_secs())
    }
}

/// Decoded keys from one successful fetch
struct KeySet {
    jwks: JwkSet,
    keys: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// JWKS client for fetching and caching the issuer's key set
///
/// # Example
///
/// ```rust,no_run
/// # use autolog_auth::{VerifierConfig, jwt::JwksClient};
/// # tokio_test::block_on(async {
/// let config = VerifierConfig::new("http://auth-api:8080/.well-known/jwks.json");
/// let client = JwksClient::new(&config)?;
///
/// let key = client.decoding_key("autolog-public-key").await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct JwksClient {
    /// JWKS endpoint URL
    jwks_uri: String,
    /// HTTP client
    http_client: reqwest::Client,
    /// Current key set, swapped whole on refresh
    cache: RwLock<Option<Arc<KeySet>>>,
    /// Serializes refreshes; holds the last attempt time
    refresh_lock: Mutex<Option<Instant>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    fetch_timeout: Duration,
}

impl JwksClient {
    /// Create a client; nothing is fetched until the first lookup
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &VerifierConfig) -> Result<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| AuthError::jwks_fetch(&config.jwks_url, e))?;

        Ok(Self {
            jwks_uri: config.jwks_url.clone(),
            http_client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(None),
            cache_ttl: config.cache_ttl(),
            min_refresh_interval: config.min_refresh_interval(),
            fetch_timeout: config.fetch_timeout(),
        })
    }

    /// Get the JWKS endpoint URI
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Get the JWKS (from cache or fetch if needed)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::JwksFetch`] if nothing is cached and the fetch fails.
    pub async fn get_jwks(&self) -> Result<JwkSet> {
        Ok(self.key_set().await?.jwks.clone())
    }

    /// Force a refresh, subject to the minimum refresh interval
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::JwksFetch`] if the fetch fails. The previous key
    /// set stays cached.
    pub async fn refresh(&self) -> Result<JwkSet> {
        let observed = self.cached().await;
        Ok(self.refresh_from(observed.as_ref()).await?.jwks.clone())
    }

    /// Look up the verification key for `kid`
    ///
    /// An unknown kid triggers one refresh before giving up, which is how a
    /// rotated issuer key is picked up.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if the kid is still unknown after
    /// the refresh, and [`AuthError::JwksFetch`] if no key set was ever
    /// fetched.
    pub async fn decoding_key(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        let set = self.key_set().await?;
        if let Some(key) = set.keys.get(kid) {
            return Ok(Arc::clone(key));
        }

        debug!(jwks_uri = %self.jwks_uri, kid, "kid not in cached JWKS, refreshing");
        match self.refresh_from(Some(&set)).await {
            Ok(fresh) => fresh.keys.get(kid).cloned().ok_or_else(|| {
                warn!(jwks_uri = %self.jwks_uri, kid, "kid not found in JWKS after refresh");
                AuthError::key_not_found(kid)
            }),
            Err(e) => {
                error!(
                    jwks_uri = %self.jwks_uri,
                    kid,
                    error = %e,
                    "JWKS refresh failed, keeping last known keys"
                );
                Err(AuthError::key_not_found(kid))
            }
        }
    }

    /// Drop the cached key set
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
        debug!(jwks_uri = %self.jwks_uri, "JWKS cache cleared");
    }

    async fn cached(&self) -> Option<Arc<KeySet>> {
        self.cache.read().await.clone()
    }

    async fn key_set(&self) -> Result<Arc<KeySet>> {
        match self.cached().await {
            Some(set) if set.fetched_at.elapsed() < self.cache_ttl => Ok(set),
            Some(stale) => {
                // Stale keys are still usable; never queue behind a running fetch
                let Ok(last_attempt) = self.refresh_lock.try_lock() else {
                    debug!(jwks_uri = %self.jwks_uri, "JWKS refresh in progress, serving stale keys");
                    return Ok(stale);
                };
                match self.refresh_locked(last_attempt, Some(&stale)).await {
                    Ok(fresh) => Ok(fresh),
                    Err(e) => {
                        error!(
                            jwks_uri = %self.jwks_uri,
                            error = %e,
                            "JWKS refresh failed, serving stale keys"
                        );
                        Ok(stale)
                    }
                }
            }
            None => self.refresh_from(None).await,
        }
    }

    /// Refresh unless another caller already replaced `observed`
    async fn refresh_from(&self, observed: Option<&Arc<KeySet>>) -> Result<Arc<KeySet>> {
        let last_attempt = self.refresh_lock.lock().await;
        self.refresh_locked(last_attempt, observed).await
    }

    /// Body of a refresh; `last_attempt` is the held refresh lock
    ///
    /// The attempt is stamped when the fetch finishes, so callers that queued
    /// behind a failed or timed-out fetch fall under the rate limit and reuse
    /// the cache instead of each starting another fetch.
    async fn refresh_locked(
        &self,
        mut last_attempt: MutexGuard<'_, Option<Instant>>,
        observed: Option<&Arc<KeySet>>,
    ) -> Result<Arc<KeySet>> {
        if let Some(current) = self.cached().await {
            if observed.is_none_or(|seen| !Arc::ptr_eq(seen, &current)) {
                debug!(jwks_uri = %self.jwks_uri, "JWKS already refreshed by another caller");
                return Ok(current);
            }
            if let Some(last) = *last_attempt
                && last.elapsed() < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = last.elapsed().as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                return Ok(current);
            }
        }

        let fetched = self.fetch().await;
        *last_attempt = Some(Instant::now());
        let fresh = Arc::new(fetched?);
        *self.cache.write().await = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    async fn fetch(&self) -> Result<KeySet> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let request = async {
            let response = self
                .http_client
                .get(&self.jwks_uri)
                .send()
                .await
                .map_err(|e| {
                    error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                    AuthError::jwks_fetch(&self.jwks_uri, e)
                })?;

            let status = response.status();
            if !status.is_success() {
                error!(
                    jwks_uri = %self.jwks_uri,
                    status = %status,
                    "JWKS endpoint returned error status"
                );
                return Err(AuthError::jwks_fetch(
                    &self.jwks_uri,
                    format!("endpoint returned status {status}"),
                ));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| AuthError::jwks_fetch(&self.jwks_uri, e))?;
            Ok::<_, AuthError>(body)
        };

        let body = tokio::time::timeout(self.fetch_timeout, request)
            .await
            .map_err(|_| {
                error!(jwks_uri = %self.jwks_uri, timeout = ?self.fetch_timeout, "JWKS fetch timed out");
                AuthError::jwks_fetch(
                    &self.jwks_uri,
                    format!("timed out after {:?}", self.fetch_timeout),
                )
            })??;

        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            AuthError::jwks_fetch(&self.jwks_uri, format!("invalid JWKS document: {e}"))
        })?;

        let keys = jwks.decoding_keys();
        if keys.is_empty() {
            error!(
                jwks_uri = %self.jwks_uri,
                published = jwks.keys.len(),
                "JWKS contains no usable RS256 signing keys"
            );
            return Err(AuthError::jwks_fetch(
                &self.jwks_uri,
                "document contains no usable RS256 signing keys",
            ));
        }

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = keys.len(),
            "Successfully fetched JWKS"
        );

        Ok(KeySet {
            jwks,
            keys,
            fetched_at: Instant::now(),
        })
    }
}
