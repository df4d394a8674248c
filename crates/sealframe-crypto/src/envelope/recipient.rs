//! Content key wrapping for key and password recipients.
//!
//! Key recipients: a fresh ephemeral X25519 secret per recipient, agreement
//! with the recipient's converted Ed25519 key, then
//! `KDF2-SHA384(shared || ephemeral_public || recipient_public, 44)` split into
//! an AES-256 key and a 12-byte nonce. The key identifier is the AAD, so an
//! entry cannot be relabelled for another recipient.
//!
//! Password recipients: `Argon2id(password, salt)` feeds the same KDF2 split,
//! with the salt as AAD. Argon2 costs travel in the entry so decryption does
//! not depend on the decryptor's configuration.

use argon2::{Algorithm, Argon2, Params, Version};
use sha2::Sha384;
use zeroize::Zeroizing;

use super::format::{PASSWORD_SALT_LEN, RecipientEntry};
use crate::{
    aead::{AES_KEY_LEN, AES_NONCE_LEN, aes_open, aes_seal},
    env::Environment,
    error::CryptoError,
    fingerprint::FingerprintAlgorithm,
    kdf::kdf2,
    keys::{Ed25519PrivateKey, Ed25519PublicKey, KEY_LEN, x25519_agree},
};

/// Content encryption key length.
pub const CEK_LEN: usize = 32;

/// Largest Argon2 memory cost accepted from an envelope (1 GiB).
pub const MAX_PASSWORD_MEMORY_KIB: u32 = 1024 * 1024;

/// Largest Argon2 pass count accepted from an envelope.
pub const MAX_PASSWORD_ITERATIONS: u32 = 64;

/// Largest Argon2 lane count accepted from an envelope.
pub const MAX_PASSWORD_PARALLELISM: u32 = 64;

/// Argon2id cost parameters for password recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordKdf {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for PasswordKdf {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordKdf {
    /// Derive 32 bytes from a password with these costs.
    pub fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; CEK_LEN]>, CryptoError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(CEK_LEN))
            .map_err(|e| CryptoError::InvalidParameter {
                reason: format!("argon2 parameters: {e}"),
            })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut out = Zeroizing::new([0u8; CEK_LEN]);
        argon2
            .hash_password_into(password, salt, &mut *out)
            .map_err(|e| CryptoError::InvalidParameter { reason: format!("argon2: {e}") })?;
        Ok(out)
    }
}

/// Who an envelope is encrypted for.
#[derive(Clone, Copy)]
pub enum Recipient<'a> {
    /// Holder of the matching private key
    Key(&'a Ed25519PublicKey),
    /// Anyone who knows the password
    Password(&'a [u8]),
}

impl std::fmt::Debug for Recipient<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Password(_) => f.write_str("Password(..)"),
        }
    }
}

/// Wrap `cek` for one recipient.
pub(crate) fn wrap(
    env: &impl Environment,
    cek: &[u8; CEK_LEN],
    recipient: Recipient<'_>,
    fingerprint: FingerprintAlgorithm,
    password_kdf: PasswordKdf,
) -> Result<RecipientEntry, CryptoError> {
    match recipient {
        Recipient::Key(public) => wrap_for_key(env, cek, public, fingerprint),
        Recipient::Password(password) => wrap_for_password(env, cek, password, password_kdf),
    }
}

fn wrap_for_key(
    env: &impl Environment,
    cek: &[u8; CEK_LEN],
    recipient: &Ed25519PublicKey,
    fingerprint: FingerprintAlgorithm,
) -> Result<RecipientEntry, CryptoError> {
    const OP: &str = "encrypt";

    let recipient_point = recipient.to_x25519(OP)?;
    let ephemeral = Zeroizing::new(env.random_array::<KEY_LEN>()?);
    let ephemeral_public = x25519_dalek::x25519(*ephemeral, x25519_dalek::X25519_BASEPOINT_BYTES);
    let shared = x25519_agree(&ephemeral, recipient_point, OP)?;

    let key_id = recipient.identifier(fingerprint);
    let (wrap_key, nonce) = key_wrap_secret(&shared, &ephemeral_public, &recipient_point)?;
    let wrapped_key = aes_seal(&wrap_key, &nonce, key_id.as_bytes(), cek)?;

    Ok(RecipientEntry::Key { key_id, ephemeral_public, wrapped_key })
}

fn wrap_for_password(
    env: &impl Environment,
    cek: &[u8; CEK_LEN],
    password: &[u8],
    kdf: PasswordKdf,
) -> Result<RecipientEntry, CryptoError> {
    let salt: [u8; PASSWORD_SALT_LEN] = env.random_array()?;
    let (wrap_key, nonce) = password_wrap_secret(password, &salt, kdf)?;
    let wrapped_key = aes_seal(&wrap_key, &nonce, &salt, cek)?;

    Ok(RecipientEntry::Password {
        salt,
        memory_kib: kdf.memory_kib,
        iterations: kdf.iterations,
        parallelism: kdf.parallelism,
        wrapped_key,
    })
}

/// Find the entry for `key` and recover the content key.
///
/// # Errors
///
/// - `RecipientNotFound` if no key entry carries this key's identifier
/// - `AuthenticationFailed` if the matching entry does not unwrap
pub(crate) fn unwrap_for_key(
    entries: &[RecipientEntry],
    key: &Ed25519PrivateKey,
    fingerprint: FingerprintAlgorithm,
    operation: &'static str,
) -> Result<Zeroizing<[u8; CEK_LEN]>, CryptoError> {
    let public = key.public_key()?;
    let key_id = public.identifier(fingerprint);

    let Some((ephemeral_public, wrapped_key)) = entries.iter().find_map(|entry| match entry {
        RecipientEntry::Key { key_id: id, ephemeral_public, wrapped_key } if *id == key_id => {
            Some((ephemeral_public, wrapped_key))
        },
        _ => None,
    }) else {
        return Err(CryptoError::RecipientNotFound { key_id: key_id.to_string() });
    };

    let recipient_point = public.to_x25519(operation)?;
    let shared = key.agree_montgomery(*ephemeral_public, operation)?;
    let (wrap_key, nonce) = key_wrap_secret(&shared, ephemeral_public, &recipient_point)?;
    let cek = aes_open(&wrap_key, &nonce, key_id.as_bytes(), wrapped_key, operation)?;
    into_cek(cek, operation)
}

/// Try every password entry in order.
///
/// Entries with out-of-range or invalid Argon2 costs are skipped, so one
/// malformed entry cannot hide a usable one behind it.
///
/// # Errors
///
/// - `RecipientNotFound` if the envelope has no password entries
/// - `InvalidFormat` if every password entry has unusable costs
/// - `AuthenticationFailed` if no usable entry unwraps
pub(crate) fn unwrap_for_password(
    entries: &[RecipientEntry],
    password: &[u8],
    operation: &'static str,
) -> Result<Zeroizing<[u8; CEK_LEN]>, CryptoError> {
    let mut tried = false;
    let mut unusable = None;
    for entry in entries {
        let RecipientEntry::Password { salt, memory_kib, iterations, parallelism, wrapped_key } =
            entry
        else {
            continue;
        };

        let kdf = PasswordKdf {
            memory_kib: *memory_kib,
            iterations: *iterations,
            parallelism: *parallelism,
        };
        // Costs come from untrusted input.
        if kdf.memory_kib > MAX_PASSWORD_MEMORY_KIB
            || kdf.iterations > MAX_PASSWORD_ITERATIONS
            || kdf.parallelism > MAX_PASSWORD_PARALLELISM
        {
            unusable = Some(format!("password entry costs too high: {kdf:?}"));
            continue;
        }
        let (wrap_key, nonce) = match password_wrap_secret(password, salt, kdf) {
            Ok(secret) => secret,
            Err(e) => {
                unusable = Some(format!("password entry costs invalid: {e}"));
                continue;
            },
        };
        tried = true;
        if let Ok(cek) = aes_open(&wrap_key, &nonce, salt, wrapped_key, operation) {
            return into_cek(cek, operation);
        }
    }

    match (tried, unusable) {
        (true, _) => Err(CryptoError::AuthenticationFailed { operation }),
        (false, Some(reason)) => Err(CryptoError::InvalidFormat { reason }),
        (false, None) => Err(CryptoError::RecipientNotFound { key_id: "password".to_string() }),
    }
}

fn key_wrap_secret(
    shared: &[u8; KEY_LEN],
    ephemeral_public: &[u8; KEY_LEN],
    recipient_point: &[u8; KEY_LEN],
) -> Result<(Zeroizing<[u8; AES_KEY_LEN]>, [u8; AES_NONCE_LEN]), CryptoError> {
    let mut input = Zeroizing::new(Vec::with_capacity(3 * KEY_LEN));
    input.extend_from_slice(shared);
    input.extend_from_slice(ephemeral_public);
    input.extend_from_slice(recipient_point);
    split_wrap_secret(&input)
}

fn password_wrap_secret(
    password: &[u8],
    salt: &[u8; PASSWORD_SALT_LEN],
    kdf: PasswordKdf,
) -> Result<(Zeroizing<[u8; AES_KEY_LEN]>, [u8; AES_NONCE_LEN]), CryptoError> {
    let derived = kdf.derive(password, salt)?;
    let mut input = Zeroizing::new(Vec::with_capacity(CEK_LEN + PASSWORD_SALT_LEN));
    input.extend_from_slice(&*derived);
    input.extend_from_slice(salt);
    split_wrap_secret(&input)
}

fn split_wrap_secret(
    input: &[u8],
) -> Result<(Zeroizing<[u8; AES_KEY_LEN]>, [u8; AES_NONCE_LEN]), CryptoError> {
    let okm = Zeroizing::new(kdf2::<Sha384>(input, AES_KEY_LEN + AES_NONCE_LEN)?);
    let mut key = Zeroizing::new([0u8; AES_KEY_LEN]);
    key.copy_from_slice(&okm[..AES_KEY_LEN]);
    let mut nonce = [0u8; AES_NONCE_LEN];
    nonce.copy_from_slice(&okm[AES_KEY_LEN..]);
    Ok((key, nonce))
}

fn into_cek(
    bytes: Vec<u8>,
    operation: &'static str,
) -> Result<Zeroizing<[u8; CEK_LEN]>, CryptoError> {
    let bytes = Zeroizing::new(bytes);
    let Ok(cek) = <[u8; CEK_LEN]>::try_from(bytes.as_slice()) else {
        return Err(CryptoError::invalid_key(operation, "wrapped content key has wrong length"));
    };
    Ok(Zeroizing::new(cek))
}
