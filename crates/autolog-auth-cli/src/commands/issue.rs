//! `issue`: mint a token from the configured keypair

use anyhow::{Context, Result};
use autolog_auth::{IssuedToken, TokenIssuer};

use crate::cli::IssueArgs;

/// Mint a token for `args.subject`
///
/// # Errors
///
/// Fails if the keypair cannot be loaded or does not match, or signing fails.
pub fn run(args: &IssueArgs) -> Result<IssuedToken> {
    let issuer = TokenIssuer::from_config(&args.keys.issuer_config())
        .context("cannot load signing keys")?;
    issuer
        .issue_for_subject(&args.subject)
        .context("cannot issue token")
}

/// Text printed for an issued token
///
/// # Errors
///
/// Fails only if JSON rendering fails.
pub fn render(issued: &IssuedToken, json: bool) -> Result<String> {
    if json {
        let doc = serde_json::json!({ "jwt": issued.token, "claims": issued.claims });
        serde_json::to_string_pretty(&doc).context("cannot render token")
    } else {
        Ok(issued.token.clone())
    }
}
