//! `verify`: check a token against the issuer's JWKS

use anyhow::{Context, Result, bail};
use autolog_auth::jwt::Claims;
use autolog_auth::{JwksVerifier, TokenVerifier, Verification};

use crate::cli::VerifyArgs;

/// Verify `args.token`, returning its claims when accepted
///
/// # Errors
///
/// Fails if the JWKS cannot be fetched, or the token is malformed, forged,
/// expired, not yet valid or from the wrong issuer.
pub async fn run(args: &VerifyArgs) -> Result<Claims> {
    let verifier = JwksVerifier::connect(args.verifier_config())
        .await
        .with_context(|| format!("cannot load JWKS from {}", args.jwks_url))?;

    match verifier.verify_token(args.token.trim()).await? {
        Verification::Valid(claims) => Ok(claims),
        Verification::Invalid { claims, reason } => {
            bail!("token for subject {} rejected: {reason}", claims.sub)
        }
    }
}
