//! `keygen`: write a fresh RSA keypair as PEM

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use tracing::info;

use crate::cli::KeygenArgs;

/// Paths written by [`run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFiles {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Generate a keypair: PKCS#8 private key, SPKI public key
///
/// # Errors
///
/// Fails if either file exists without `--force`, or on any I/O error.
pub fn run(args: &KeygenArgs) -> Result<KeyFiles> {
    let private_path = args.out.clone();
    let public_path = args.public_out();

    if !args.force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    info!(bits = args.bits, "generating RSA keypair");
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), usize::from(args.bits))
        .context("RSA key generation failed")?;
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("cannot encode private key")?;
    let public_pem = private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .context("cannot encode public key")?;

    if let Some(dir) = private_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    write_private(&private_path, private_pem.as_bytes())?;
    fs::write(&public_path, public_pem.as_bytes())
        .with_context(|| format!("cannot write {}", public_path.display()))?;

    info!(
        private_key = %private_path.display(),
        public_key = %public_path.display(),
        "keypair written"
    );
    Ok(KeyFiles {
        private_key: private_path,
        public_key: public_path,
    })
}

#[cfg(unix)]
fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("cannot write {}", path.display()))?;
    file.write_all(pem)
        .with_context(|| format!("cannot write {}", path.display()))
}

#[cfg(not(unix))]
fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    fs::write(path, pem).with_context(|| format!("cannot write {}", path.display()))
}
