//! Password-protected private key export.
//!
//! ```text
//! [salt: 32 bytes][AES-256-GCM(encoded key) + tag]
//! ```
//!
//! The wrapping key and nonce come from HKDF-SHA512 with the password as
//! input keying material and the random salt. Every export is wrapped, an
//! empty password included, so the format is uniform on import.

use hkdf::Hkdf;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::{
    aead::{AES_KEY_LEN, AES_NONCE_LEN, AES_TAG_LEN, aes_open, aes_seal},
    env::Environment,
    error::CryptoError,
    keys::Ed25519PrivateKey,
};

/// Salt length prepended to every export.
pub const EXPORT_SALT_LEN: usize = 32;

const EXPORT_INFO: &[u8] = b"sealframe key export v1";

/// Encrypt a private key under `password`.
pub fn export_private_key(
    env: &impl Environment,
    key: &Ed25519PrivateKey,
    password: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if key.is_empty() {
        return Err(CryptoError::invalid_key("export private key", "private key is empty"));
    }
    let salt: [u8; EXPORT_SALT_LEN] = env.random_array()?;
    let (wrap_key, nonce) = wrapping_key(password, &salt);

    let encoded = key.encode();
    let ciphertext = aes_seal(&wrap_key, &nonce, &[], &encoded)?;

    let mut out = Vec::with_capacity(EXPORT_SALT_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an export produced by [`export_private_key`].
///
/// A wrong password surfaces as [`CryptoError::AuthenticationFailed`].
pub fn import_private_key(data: &[u8], password: &[u8]) -> Result<Ed25519PrivateKey, CryptoError> {
    if data.len() < EXPORT_SALT_LEN + AES_TAG_LEN {
        return Err(CryptoError::invalid_key("import private key", "exported key is truncated"));
    }
    let (salt, ciphertext) = data.split_at(EXPORT_SALT_LEN);
    let (wrap_key, nonce) = wrapping_key(password, salt);

    let encoded =
        Zeroizing::new(aes_open(&wrap_key, &nonce, &[], ciphertext, "import private key")?);
    Ed25519PrivateKey::decode(&encoded)
}

fn wrapping_key(
    password: &[u8],
    salt: &[u8],
) -> (Zeroizing<[u8; AES_KEY_LEN]>, [u8; AES_NONCE_LEN]) {
    let hkdf = Hkdf::<Sha512>::new(Some(salt), password);
    let mut okm = Zeroizing::new([0u8; AES_KEY_LEN + AES_NONCE_LEN]);
    let Ok(()) = hkdf.expand(EXPORT_INFO, &mut *okm) else {
        unreachable!("44 bytes is within HKDF-SHA512 output limit")
    };

    let mut key = Zeroizing::new([0u8; AES_KEY_LEN]);
    key.copy_from_slice(&okm[..AES_KEY_LEN]);
    let mut nonce = [0u8; AES_NONCE_LEN];
    nonce.copy_from_slice(&okm[AES_KEY_LEN..]);
    (key, nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{env::SystemEnv, keys::Ed25519Keypair};

    #[test]
    fn export_import_roundtrip() {
        let env = SystemEnv::new();
        let keypair = Ed25519Keypair::generate(&env).unwrap();

        let exported = export_private_key(&env, keypair.private_key(), b"hunter2").unwrap();
        let imported = import_private_key(&exported, b"hunter2").unwrap();

        assert_eq!(&imported, keypair.private_key());
    }

    #[test]
    fn empty_password_is_still_wrapped() {
        let env = SystemEnv::new();
        let keypair = Ed25519Keypair::generate(&env).unwrap();

        let exported = export_private_key(&env, keypair.private_key(), b"").unwrap();
        assert_eq!(exported.len(), EXPORT_SALT_LEN + 33 + AES_TAG_LEN);

        let imported = import_private_key(&exported, b"").unwrap();
        assert_eq!(&imported, keypair.private_key());
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let env = SystemEnv::new();
        let keypair = Ed25519Keypair::generate(&env).unwrap();
        let exported = export_private_key(&env, keypair.private_key(), b"right").unwrap();

        let result = import_private_key(&exported, b"wrong");
        let expected = CryptoError::AuthenticationFailed { operation: "import private key" };
        assert_eq!(result, Err(expected));
    }

    #[test]
    fn exports_use_fresh_salts() {
        let env = SystemEnv::new();
        let keypair = Ed25519Keypair::generate(&env).unwrap();

        let a = export_private_key(&env, keypair.private_key(), b"pw").unwrap();
        let b = export_private_key(&env, keypair.private_key(), b"pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn truncated_export_is_invalid_key() {
        let result = import_private_key(&[0u8; 20], b"pw");
        assert!(matches!(result, Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn empty_key_cannot_be_exported() {
        let result = export_private_key(&SystemEnv::new(), &Ed25519PrivateKey::default(), b"pw");
        assert!(matches!(result, Err(CryptoError::InvalidKey { .. })));
    }
}
