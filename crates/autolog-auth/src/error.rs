//! Error types for token issuance and verification
//!
//! Every fallible operation in this crate returns [`AuthError`]. Errors are
//! split into two classes that the HTTP boundary maps to different responses:
//!
//! - **client errors** (`401`): the caller presented missing, malformed,
//!   forged, unknown-key or expired credentials
//! - **server errors** (`500`): key material, signing, JWKS distribution or a
//!   collaborator failed; the detail is logged and never returned to callers
//!
//! [`AuthError::TokenExpired`] is the one client error with its own
//! user-facing message.

use http::StatusCode;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication error taxonomy
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header (or a blank one) on a protected request
    #[error("missing authorization header")]
    MissingAuthorization,

    /// `Authorization` header present but not of the form `Bearer <token>`
    #[error("malformed authorization header")]
    MalformedHeader,

    /// Token is not a decodable three-part JWS with the expected claims
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Token decoded but the signature does not verify against the key
    #[error("token signature is invalid")]
    InvalidSignature,

    /// Token `exp` is in the past
    #[error("token expired")]
    TokenExpired,

    /// Token `kid` is absent from the key set, even after a refresh
    #[error("signing key '{kid}' not found in JWKS")]
    KeyNotFound {
        /// Key id declared by the token header
        kid: String,
    },

    /// Login credentials were rejected by the credential validator
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A caller-supplied argument violates an invariant
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required collaborator or setting was not configured
    #[error("missing required configuration: {0}")]
    MissingConfiguration(&'static str),

    /// Key material could not be read or parsed
    #[error("invalid key material: {0}")]
    KeyMaterial(String),

    /// Token signing failed
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// The JWKS document could not be fetched or parsed
    #[error("JWKS fetch from {uri} failed: {reason}")]
    JwksFetch {
        /// JWKS endpoint
        uri: String,
        /// What went wrong
        reason: String,
    },

    /// The credential store failed while checking a login
    #[error("credential validation failed: {0}")]
    Credentials(String),

    /// The random id source failed
    #[error("failed to generate random id: {0}")]
    IdGeneration(String),
}

impl AuthError {
    /// Construct a JWKS fetch error
    pub fn jwks_fetch(uri: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::JwksFetch {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// Construct a key-not-found error
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Whether the caller is at fault (maps to 401) rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingAuthorization
                | Self::MalformedHeader
                | Self::MalformedToken(_)
                | Self::InvalidSignature
                | Self::TokenExpired
                | Self::KeyNotFound { .. }
                | Self::InvalidCredentials
        )
    }

    /// Whether this is the distinguished expiry error
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// HTTP status for this error at the service boundary
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Message safe to return to the caller
    ///
    /// Only expiry gets a specific message; everything else is opaque.
    pub fn public_message(&self) -> Option<&'static str> {
        match self {
            Self::TokenExpired => Some("token expired"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_unauthorized() {
        let errors = [
            AuthError::MissingAuthorization,
            AuthError::MalformedHeader,
            AuthError::MalformedToken("bad".into()),
            AuthError::InvalidSignature,
            AuthError::TokenExpired,
            AuthError::key_not_found("kid-1"),
            AuthError::InvalidCredentials,
        ];
        for err in errors {
            assert!(err.is_client_error(), "{err} should be a client error");
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_server_errors_map_to_internal() {
        let errors = [
            AuthError::MissingConfiguration("credential validator"),
            AuthError::KeyMaterial("bad pem".into()),
            AuthError::Signing("boom".into()),
            AuthError::jwks_fetch("http://localhost/jwks", "connection refused"),
            AuthError::Credentials("db down".into()),
            AuthError::IdGeneration("entropy".into()),
            AuthError::InvalidArgument("empty subject".into()),
        ];
        for err in errors {
            assert!(!err.is_client_error(), "{err} should be a server error");
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_only_expiry_has_public_message() {
        assert_eq!(AuthError::TokenExpired.public_message(), Some("token expired"));
        assert!(AuthError::TokenExpired.is_expired());
        assert_eq!(AuthError::InvalidSignature.public_message(), None);
        assert_eq!(
            AuthError::jwks_fetch("u", "r").public_message(),
            None
        );
    }

    #[test]
    fn test_missing_configuration_distinct_from_invalid_argument() {
        let missing = AuthError::MissingConfiguration("credential validator");
        let invalid = AuthError::InvalidArgument("subject".into());
        assert!(matches!(missing, AuthError::MissingConfiguration(_)));
        assert!(!matches!(invalid, AuthError::MissingConfiguration(_)));
        assert_ne!(missing.to_string(), invalid.to_string());
    }
}
