//! RS256 token issue and verify
//!
//! Signature and structure are checked by `jsonwebtoken`; the temporal and
//! issuer checks run here against a caller-supplied `now`, so expiry is
//! decided by the injected [`Clock`](crate::providers::Clock) rather than the
//! process clock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation, decode, decode_header, encode};
use tracing::{debug, error};

use super::Claims;
use super::keys::SigningKey;
use crate::error::{AuthError, Result};

/// The only accepted signing algorithm
pub const ALGORITHM: Algorithm = Algorithm::RS256;

/// Everything needed to mint one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInput {
    /// `iss`
    pub issuer: String,
    /// `sub`, the user id
    pub subject: String,
    /// `jti`
    pub token_id: String,
    /// `iat`
    pub issued_at: DateTime<Utc>,
    /// `nbf`
    pub not_before: DateTime<Utc>,
    /// `exp`
    pub expires_at: DateTime<Utc>,
}

impl TokenInput {
    fn claims(&self) -> Result<Claims> {
        if self.subject.trim().is_empty() {
            return Err(AuthError::InvalidArgument("subject must not be empty".to_string()));
        }
        if self.token_id.trim().is_empty() {
            return Err(AuthError::InvalidArgument("token id must not be empty".to_string()));
        }
        if self.expires_at <= self.issued_at {
            return Err(AuthError::InvalidArgument(
                "expiry must be after issuance".to_string(),
            ));
        }
        if self.not_before > self.expires_at {
            return Err(AuthError::InvalidArgument(
                "not-before must not be after expiry".to_string(),
            ));
        }

        Ok(Claims {
            iss: self.issuer.clone(),
            sub: self.subject.clone(),
            exp: self.expires_at.timestamp(),
            nbf: self.not_before.timestamp(),
            iat: self.issued_at.timestamp(),
            jti: self.token_id.clone(),
        })
    }
}

/// Sign a token; the header carries `alg: RS256` and the key's `kid`
///
/// # Errors
///
/// Returns [`AuthError::InvalidArgument`] for a blank subject or token id or
/// inconsistent timestamps, and [`AuthError::Signing`] if signing fails.
pub fn issue(input: &TokenInput, key: &SigningKey) -> Result<String> {
    let claims = input.claims()?;

    let mut header = Header::new(ALGORITHM);
    header.kid = Some(key.kid().to_string());

    encode(&header, &claims, key.encoding_key()).map_err(|e| {
        error!(kid = %key.kid(), error = %e, "failed to sign token");
        AuthError::Signing(e.to_string())
    })
}

/// Claim checks applied after the signature verifies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Clock skew tolerated on `exp` and `nbf`
    pub leeway: Duration,
    /// Required `iss`, if any
    pub expected_issuer: Option<String>,
}

/// Why a correctly signed, unexpired token is still not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// `nbf` is in the future
    NotYetValid,
    /// `iss` differs from the expected issuer
    IssuerMismatch,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotYetValid => f.write_str("token not yet valid"),
            Self::IssuerMismatch => f.write_str("unexpected issuer"),
        }
    }
}

/// Outcome of verifying a token that decoded and carried a good signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Token accepted
    Valid(Claims),
    /// Token well-formed and signed but rejected by a claim check
    Invalid {
        /// Decoded claims, for logging
        claims: Claims,
        /// Failed check
        reason: InvalidReason,
    },
}

impl Verification {
    /// Claims, valid or not
    pub fn claims(&self) -> &Claims {
        match self {
            Self::Valid(claims) | Self::Invalid { claims, .. } => claims,
        }
    }

    /// Whether the token was accepted
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Accepted claims, or the rejection reason
    pub fn into_valid(self) -> std::result::Result<Claims, InvalidReason> {
        match self {
            Self::Valid(claims) => Ok(claims),
            Self::Invalid { reason, .. } => Err(reason),
        }
    }
}

/// Read the header's `kid` without verifying anything
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] if the header does not decode or
/// names an algorithm other than RS256.
pub fn decode_key_id(token: &str) -> Result<Option<String>> {
    let header = decode_header(token).map_err(|e| {
        debug!(error = %e, "failed to decode token header");
        AuthError::MalformedToken(e.to_string())
    })?;
    if header.alg != ALGORITHM {
        debug!(alg = ?header.alg, "rejecting token with unexpected algorithm");
        return Err(AuthError::MalformedToken(format!(
            "unsupported algorithm {:?}",
            header.alg
        )));
    }
    Ok(header.kid)
}

/// Verify `token` against `key` at instant `now`
///
/// Expiry is checked first and reported as an error, so callers can tell
/// "log in again" apart from every other rejection:
///
/// - expired: `now >= exp + leeway`
/// - not yet valid: `now + leeway < nbf`
///
/// # Errors
///
/// - [`AuthError::MalformedToken`] - not a decodable RS256 JWS with the
///   expected claims
/// - [`AuthError::InvalidSignature`] - signature does not verify under `key`
/// - [`AuthError::TokenExpired`] - past `exp`
pub fn verify(
    token: &str,
    key: &DecodingKey,
    options: &VerifyOptions,
    now: DateTime<Utc>,
) -> Result<Verification> {
    decode_key_id(token)?;

    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

    let claims = decode::<Claims>(token, key, &validation)
        .map_err(classify)?
        .claims;

    let now = now.timestamp();
    let leeway = i64::try_from(options.leeway.as_secs()).unwrap_or(i64::MAX);

    if now >= claims.exp.saturating_add(leeway) {
        debug!(sub = %claims.sub, jti = %claims.jti, exp = claims.exp, "token expired");
        return Err(AuthError::TokenExpired);
    }
    if now.saturating_add(leeway) < claims.nbf {
        return Ok(Verification::Invalid {
            claims,
            reason: InvalidReason::NotYetValid,
        });
    }
    if let Some(expected) = &options.expected_issuer
        && &claims.iss != expected
    {
        return Ok(Verification::Invalid {
            claims,
            reason: InvalidReason::IssuerMismatch,
        });
    }

    Ok(Verification::Valid(claims))
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => {
            debug!(error = %err, "token rejected");
            AuthError::MalformedToken(err.to_string())
        }
    }
}
