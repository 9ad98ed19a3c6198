//! CLI argument parsing

use std::net::SocketAddr;
use std::path::PathBuf;

use autolog_auth::config::{DEFAULT_ISSUER, DEFAULT_TOKEN_TTL_MINUTES};
use autolog_auth::jwt::DEFAULT_KEY_ID;
use autolog_auth::{IssuerConfig, VerifierConfig};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::Level;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "autolog-auth",
    version,
    about = "Token authentication tooling for the autolog services",
    long_about = "Generate RSA keys, publish them as a JWKS document, mint and verify RS256 \
                  tokens, and run the auth service's JWKS/login/whoami endpoints.\n\n\
                  Key paths and token settings can come from the same environment variables \
                  the services use (JWT_PRIVATE_KEY_PATH, JWT_PUBLIC_KEY_PATH, \
                  JWT_EXPIRY_LENGTH_MINUTES, JWKS_URL)."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Log level implied by `--quiet` / `-v`
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an RSA keypair in PEM form
    Keygen(KeygenArgs),

    /// Print the JWKS document for a public key
    Jwks(JwksArgs),

    /// Mint a token for a user id
    Issue(IssueArgs),

    /// Verify a token against a JWKS endpoint
    Verify(VerifyArgs),

    /// Serve the JWKS, login and whoami endpoints
    Serve(ServeArgs),
}

/// Arguments for `keygen`
#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Private key output path; the public key is written next to it with a `.pub` suffix
    #[arg(long, short = 'o', default_value = "jwt.key")]
    pub out: PathBuf,

    /// Modulus size in bits
    #[arg(long, default_value_t = 2048, value_parser = clap::value_parser!(u16).range(2048..=8192))]
    pub bits: u16,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

impl KeygenArgs {
    /// Path of the public key file
    pub fn public_out(&self) -> PathBuf {
        let mut name = self.out.clone().into_os_string();
        name.push(".pub");
        PathBuf::from(name)
    }
}

/// Arguments for `jwks`
#[derive(Args, Debug, Clone)]
pub struct JwksArgs {
    /// PEM public key
    #[arg(long, env = "JWT_PUBLIC_KEY_PATH")]
    pub public_key: PathBuf,

    /// Key id to publish under
    #[arg(long, env = "JWT_KEY_ID", default_value = DEFAULT_KEY_ID)]
    pub kid: String,
}

/// Keypair location shared by `issue` and `serve`
#[derive(Args, Debug, Clone)]
pub struct KeyPairArgs {
    /// PEM private key
    #[arg(long, env = "JWT_PRIVATE_KEY_PATH")]
    pub private_key: PathBuf,

    /// PEM public key; must be the private key's public half
    #[arg(long, env = "JWT_PUBLIC_KEY_PATH")]
    pub public_key: PathBuf,

    /// Key id stamped into token headers
    #[arg(long, env = "JWT_KEY_ID", default_value = DEFAULT_KEY_ID)]
    pub kid: String,

    /// `iss` claim
    #[arg(long, env = "JWT_ISSUER", default_value = DEFAULT_ISSUER)]
    pub issuer: String,

    /// Token lifetime in minutes
    #[arg(long, env = "JWT_EXPIRY_LENGTH_MINUTES", default_value_t = DEFAULT_TOKEN_TTL_MINUTES)]
    pub ttl_minutes: i64,
}

impl KeyPairArgs {
    /// Issuer config for these arguments
    pub fn issuer_config(&self) -> IssuerConfig {
        IssuerConfig::new(&self.private_key, &self.public_key)
            .with_key_id(&self.kid)
            .with_issuer(&self.issuer)
            .with_token_ttl_minutes(self.ttl_minutes)
    }
}

/// Arguments for `issue`
#[derive(Args, Debug, Clone)]
pub struct IssueArgs {
    #[command(flatten)]
    pub keys: KeyPairArgs,

    /// User id to put in `sub`
    #[arg(long, short = 's')]
    pub subject: String,

    /// Print the token with its claims as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `verify`
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Token to verify
    pub token: String,

    /// Issuer's JWKS endpoint
    #[arg(long, env = "JWKS_URL")]
    pub jwks_url: String,

    /// Clock skew tolerated on `exp` and `nbf`, seconds
    #[arg(long, default_value_t = 0)]
    pub leeway_secs: u64,

    /// Require this `iss`
    #[arg(long)]
    pub expected_issuer: Option<String>,

    /// Bound on the JWKS fetch, seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}

impl VerifyArgs {
    /// Verifier config for these arguments
    pub fn verifier_config(&self) -> VerifierConfig {
        let mut config = VerifierConfig::new(&self.jwks_url)
            .with_leeway(std::time::Duration::from_secs(self.leeway_secs))
            .with_fetch_timeout(std::time::Duration::from_secs(self.timeout_secs));
        if let Some(issuer) = &self.expected_issuer {
            config = config.with_expected_issuer(issuer);
        }
        config
    }
}

/// Arguments for `serve`
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub keys: KeyPairArgs,

    /// Listen address
    #[arg(long, env = "AUTH_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// `Cache-Control: max-age` of the JWKS endpoint, seconds
    #[arg(long, default_value_t = 300)]
    pub jwks_max_age_secs: u64,
}
