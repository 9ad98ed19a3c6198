//! # autolog-auth CLI
//!
//! Operator tooling for the autolog token infrastructure.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a keypair (jwt.key + jwt.key.pub)
//! autolog-auth keygen --out /run/secrets/jwt.key
//!
//! # Print the JWKS the auth service will publish
//! autolog-auth jwks --public-key /run/secrets/jwt.key.pub
//!
//! # Mint a token for user 42
//! autolog-auth issue --private-key jwt.key --public-key jwt.key.pub --subject 42
//!
//! # Verify it the way a downstream service would
//! autolog-auth verify "$TOKEN" --jwks-url http://localhost:8080/.well-known/jwks.json
//!
//! # Run the auth endpoints
//! autolog-auth serve --private-key jwt.key --public-key jwt.key.pub
//! ```

pub mod cli;
pub mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Commands};

/// Parse arguments, set up logging and run the selected command
///
/// # Errors
///
/// Returns the failing command's error.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    execute(cli.command).await
}

/// Run one command, printing its output to stdout
///
/// # Errors
///
/// Returns the command's error.
pub async fn execute(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Keygen(args) => {
            let files = commands::keygen::run(&args)?;
            println!("private key: {}", files.private_key.display());
            println!("public key:  {}", files.public_key.display());
        }
        Commands::Jwks(args) => println!("{}", commands::jwks::run(&args)?),
        Commands::Issue(args) => {
            let issued = commands::issue::run(&args)?;
            println!("{}", commands::issue::render(&issued, args.json)?);
        }
        Commands::Verify(args) => {
            let claims = commands::verify::run(&args).await?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::Serve(args) => commands::serve::run(&args).await?,
    }
    Ok(())
}

/// `RUST_LOG` wins when set; otherwise the level comes from `-v` / `--quiet`
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
