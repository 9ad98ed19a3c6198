//! Shared RSA keypairs for unit tests; generated once per test binary

use std::sync::OnceLock;

use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

use crate::jwt::{DEFAULT_KEY_ID, SigningKey};

pub(crate) struct TestKeyPair {
    pub private_key: RsaPrivateKey,
    pub private_pem: String,
    pub public_pem: String,
}

impl TestKeyPair {
    fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate RSA key");
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("encode private key")
            .to_string();
        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("encode public key");
        Self {
            private_key,
            private_pem,
            public_pem,
        }
    }

    pub fn signing_key(&self, kid: &str) -> SigningKey {
        SigningKey::from_pem(kid, self.private_pem.as_bytes(), self.public_pem.as_bytes())
            .expect("signing key")
    }
}

pub(crate) fn primary() -> &'static TestKeyPair {
    static KEYS: OnceLock<TestKeyPair> = OnceLock::new();
    KEYS.get_or_init(TestKeyPair::generate)
}

pub(crate) fn secondary() -> &'static TestKeyPair {
    static KEYS: OnceLock<TestKeyPair> = OnceLock::new();
    KEYS.get_or_init(TestKeyPair::generate)
}

pub(crate) fn signing_key() -> SigningKey {
    primary().signing_key(DEFAULT_KEY_ID)
}
