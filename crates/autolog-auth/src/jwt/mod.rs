//! JWT infrastructure shared by the issuer and every verifying service
//!
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │ auth-api (issuer)            │        │ autolog-api / images         │
//! │  keys    - RSA keypair       │  JWKS  │  verifier - JwksClient cache │
//! │  codec   - sign RS256        │ ─────▶ │  codec    - verify RS256     │
//! │  jwks    - public key → JWK  │        │                              │
//! └──────────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `keys` - loading RSA key material from PEM
//! - `codec` - token issue/verify with clock-driven temporal checks
//! - `jwks` - JWK/JWKS documents, the publisher and the caching client
//! - `verifier` - the [`TokenVerifier`] seam, static-key and JWKS-backed verifiers

pub mod codec;
pub mod jwks;
pub mod keys;
pub mod verifier;

pub use codec::{InvalidReason, TokenInput, Verification, VerifyOptions};
pub use jwks::{Jwk, JwkSet, JwksClient, JwksPublisher, public_key_to_jwk};
pub use keys::{DEFAULT_KEY_ID, SigningKey};
pub use verifier::{JwksVerifier, StaticKeyVerifier, TokenVerifier};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Registered claims carried by every autolog token (RFC 7519 §4.1)
///
/// Tokens are stateless: claims are fixed at issuance and never stored
/// server-side, so a token stays valid until `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (iss) - the service that minted the token
    pub iss: String,
    /// Subject (sub) - the authenticated user's id
    pub sub: String,
    /// Expiration time (exp), Unix seconds
    pub exp: i64,
    /// Not before (nbf), Unix seconds
    pub nbf: i64,
    /// Issued at (iat), Unix seconds
    pub iat: i64,
    /// Token id (jti), unique per issuance
    pub jti: String,
}

impl Claims {
    /// The authenticated user's id
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    /// `iat` as a timestamp
    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp(self.iat)
    }

    /// `nbf` as a timestamp
    pub fn not_before(&self) -> DateTime<Utc> {
        timestamp(self.nbf)
    }

    /// `exp` as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_use_registered_names() {
        let claims = Claims {
            iss: "auth-api".into(),
            sub: "42".into(),
            exp: 1_700_001_800,
            nbf: 1_700_000_000,
            iat: 1_700_000_000,
            jti: "0b6f6a43-3c55-4a1c-9d7e-1a3c2b4d5e6f".into(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        for name in ["iss", "sub", "exp", "nbf", "iat", "jti"] {
            assert!(json.get(name).is_some(), "missing {name}");
        }
        assert_eq!(claims.user_id(), "42");
        assert_eq!(claims.expires_at().timestamp(), 1_700_001_800);
        assert_eq!(claims.issued_at(), claims.not_before());
    }

    #[test]
    fn test_claims_reject_missing_fields() {
        let partial = serde_json::json!({"iss": "auth-api", "sub": "42", "exp": 1});
        assert!(serde_json::from_value::<Claims>(partial).is_err());
    }
}
