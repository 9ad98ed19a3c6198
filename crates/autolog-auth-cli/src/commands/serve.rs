//! `serve`: run the auth service's JWKS, login and whoami endpoints
//!
//! No user store is wired here, so `/v1/auth/login` answers 500 until a
//! deployment supplies a credential validator through the library API.

use std::time::Duration;

use anyhow::{Context, Result};
use autolog_auth::TokenIssuer;
use autolog_auth::server::{self, IssuerState};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::ServeArgs;

/// Build the router for `args`
///
/// # Errors
///
/// Fails if the keypair cannot be loaded or does not match.
pub fn app(args: &ServeArgs) -> Result<axum::Router> {
    let mut config = args.keys.issuer_config();
    config.jwks_max_age_secs = args.jwks_max_age_secs;

    let issuer = TokenIssuer::from_config(&config).context("cannot load signing keys")?;
    info!(
        kid = %issuer.signing_key().kid(),
        issuer = %issuer.issuer(),
        ttl_minutes = issuer.token_ttl().num_minutes(),
        "signing key loaded"
    );
    warn!("no credential validator configured; login is disabled");

    server::router(IssuerState::new(issuer)).context("cannot build routes")
}

/// Serve until Ctrl-C
///
/// # Errors
///
/// Fails if the keys cannot be loaded or the address cannot be bound.
pub async fn run(args: &ServeArgs) -> Result<()> {
    let app = app(args)?;
    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("cannot bind {}", args.bind))?;
    info!(
        addr = %args.bind,
        jwks_max_age = ?Duration::from_secs(args.jwks_max_age_secs),
        "auth service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("auth service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
