//! Password credential hashing.
//!
//! Credentials are opaque to the licensing core; this module only needs to
//! store and check them. Format: `v1$<salt-hex>$<digest-hex>` where the
//! digest is SHA-256 over a domain prefix, the salt, and the secret.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const DOMAIN_PREFIX: &[u8] = b"keygate-secret-v1:";

fn digest(salt: &[u8], secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_PREFIX);
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash a secret with a fresh random salt.
pub fn hash_secret(secret: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("v1${}${}", hex::encode(salt), hex::encode(digest(&salt, secret)))
}

/// Verify a secret against a stored hash in constant time.
///
/// Unknown formats verify as false rather than erroring, so a corrupt
/// credential row behaves like a wrong password.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("v1"), Some(salt_hex), Some(digest_hex), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };
    digest(&salt, secret).ct_eq(&expected).into()
}
