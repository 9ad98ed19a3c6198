//! `jwks`: print the JWKS document for a public key

use anyhow::{Context, Result};
use autolog_auth::jwt::JwksPublisher;
use autolog_auth::jwt::keys::read_pem;

use crate::cli::JwksArgs;

/// Render the JWKS for `args.public_key` as pretty JSON
///
/// # Errors
///
/// Fails if the key file cannot be read or is not an RSA public key.
pub fn run(args: &JwksArgs) -> Result<String> {
    let pem = read_pem(&args.public_key)?;
    let publisher = JwksPublisher::from_public_key_pem(&args.kid, &pem)
        .with_context(|| format!("cannot publish {}", args.public_key.display()))?;
    serde_json::to_string_pretty(publisher.jwks()).context("cannot render JWKS")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::KeygenArgs;
    use crate::commands::keygen;

    #[test]
    fn test_jwks_for_generated_key() {
        let dir = tempfile::tempdir().unwrap();
        let files = keygen::run(&KeygenArgs {
            out: dir.path().join("jwt.key"),
            bits: 2048,
            force: false,
        })
        .unwrap();

        let out = run(&JwksArgs {
            public_key: files.public_key,
            kid: "autolog-public-key".into(),
        })
        .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["keys"][0]["kid"], "autolog-public-key");
        assert_eq!(doc["keys"][0]["alg"], "RS256");
        assert_eq!(doc["keys"][0]["e"], "AQAB");
    }

    #[test]
    fn test_jwks_missing_file() {
        let err = run(&JwksArgs {
            public_key: "/nonexistent/jwt.key.pub".into(),
            kid: "k".into(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/jwt.key.pub"));
    }
}
