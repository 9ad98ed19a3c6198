//! RSA key material
//!
//! The issuer holds a [`SigningKey`]: the private key, the public key it
//! publishes, and the `kid` that ties tokens to the JWKS entry. Both halves
//! are loaded from PEM and must belong together, otherwise every token the
//! issuer mints would fail verification downstream.

use std::path::Path;

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, error};

use super::jwks::{Jwk, public_key_to_jwk};
use crate::error::{AuthError, Result};

/// Key id published when none is configured
pub const DEFAULT_KEY_ID: &str = "autolog-public-key";

/// Private signing key plus the public half it is published as
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    encoding_key: EncodingKey,
    public_key: RsaPublicKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("encoding_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a PEM private key and its PEM public key
    ///
    /// Accepts PKCS#8 or PKCS#1 for the private key and SPKI or PKCS#1 for
    /// the public key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if either PEM is unparseable or the
    /// public key is not the one derived from the private key.
    pub fn from_pem(kid: impl Into<String>, private_pem: &[u8], public_pem: &[u8]) -> Result<Self> {
        let kid = kid.into();
        let private_key = parse_private_key_pem(private_pem)?;
        let public_key = parse_public_key_pem(public_pem)?;

        if private_key.to_public_key() != public_key {
            error!(kid = %kid, "configured public key does not match private key");
            return Err(AuthError::KeyMaterial(
                "public key does not match private key".to_string(),
            ));
        }

        Self::assemble(kid, private_pem, public_key)
    }

    /// Build a signing key from a PEM private key, deriving the public half
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if the PEM is unparseable.
    pub fn from_private_pem(kid: impl Into<String>, private_pem: &[u8]) -> Result<Self> {
        let public_key = parse_private_key_pem(private_pem)?.to_public_key();
        Self::assemble(kid.into(), private_pem, public_key)
    }

    /// Load a signing key from a private and a public PEM file
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if either file is unreadable or the
    /// keys do not form a pair.
    pub fn from_files(
        kid: impl Into<String>,
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let private_pem = read_pem(private_path.as_ref())?;
        let public_pem = read_pem(public_path.as_ref())?;
        Self::from_pem(kid, &private_pem, &public_pem)
    }

    fn assemble(kid: String, private_pem: &[u8], public_key: RsaPublicKey) -> Result<Self> {
        if kid.trim().is_empty() {
            return Err(AuthError::InvalidArgument("key id must not be empty".to_string()));
        }
        let encoding_key = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| AuthError::KeyMaterial(format!("private key rejected: {e}")))?;

        debug!(kid = %kid, "loaded RSA signing key");
        Ok(Self {
            kid,
            encoding_key,
            public_key,
        })
    }

    /// Key id stamped into every token header
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Private key handle for signing
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Public half
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Public half as a JWK under this key's `kid`
    pub fn public_jwk(&self) -> Jwk {
        public_key_to_jwk(&self.kid, &self.public_key)
    }

    /// Verification key matching this signing key
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyMaterial`] if the public components are rejected.
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        self.public_jwk().to_decoding_key()
    }
}

/// Parse an RSA public key from SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM
///
/// # Errors
///
/// Returns [`AuthError::KeyMaterial`] if neither encoding parses.
pub fn parse_public_key_pem(pem: &[u8]) -> Result<RsaPublicKey> {
    let pem = pem_str(pem)?;
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| AuthError::KeyMaterial(format!("unparseable RSA public key: {e}")))
}

/// Parse an RSA private key from PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM
///
/// # Errors
///
/// Returns [`AuthError::KeyMaterial`] if neither encoding parses.
pub fn parse_private_key_pem(pem: &[u8]) -> Result<RsaPrivateKey> {
    let pem = pem_str(pem)?;
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| AuthError::KeyMaterial(format!("unparseable RSA private key: {e}")))
}

/// Read a PEM file
///
/// # Errors
///
/// Returns [`AuthError::KeyMaterial`] naming the path if the read fails.
pub fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| AuthError::KeyMaterial(format!("cannot read {}: {e}", path.display())))
}

fn pem_str(pem: &[u8]) -> Result<&str> {
    std::str::from_utf8(pem).map_err(|_| AuthError::KeyMaterial("PEM is not UTF-8".to_string()))
}
