//! Established PFS session and per-message encryption.
//!
//! A session holds two 64-byte directional keys derived once by the
//! handshake. Each message draws a fresh 16-byte salt and derives its own
//! key and nonce:
//!
//! ```text
//! key || nonce = KDF2-SHA256(send_key || salt || AD, 56)     (32 + 24 bytes)
//! ciphertext   = XChaCha20-Poly1305(key, nonce, plaintext, aad = AD)
//! ```
//!
//! Derivation is a pure function of (directional key, salt, AD): nothing
//! advances between messages, so messages can be decrypted in any order.
//! The role decides which directional key sends; flipping it makes every
//! valid ciphertext fail to authenticate.

use std::fmt;

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::{env::Environment, error::CryptoError, kdf::kdf2};

/// Directional key length.
pub const DIRECTION_KEY_LEN: usize = 64;

/// Session identifier length.
pub const SESSION_ID_LEN: usize = 32;

/// Per-message salt length.
pub const MESSAGE_SALT_LEN: usize = 16;

/// Domain label mixed into the AD and session identifier.
const SESSION_LABEL: &[u8] = b"sealframe-pfs";

const SNAPSHOT_VERSION: u8 = 1;
const MESSAGE_KEY_LEN: usize = 32;
const MESSAGE_NONCE_LEN: usize = 24;

/// Which side of the handshake this session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Started the handshake; sends with the first directional key
    Initiator,
    /// Received the handshake; sends with the second directional key
    Responder,
}

/// One encrypted session message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Fresh random salt for this message
    pub salt: [u8; MESSAGE_SALT_LEN],
    /// XChaCha20-Poly1305 ciphertext with tag
    pub ciphertext: Vec<u8>,
}

impl SessionMessage {
    /// Flat encoding: `salt || ciphertext`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MESSAGE_SALT_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the flat encoding.
    pub fn decode(data: &[u8]) -> Result<Self, CryptoError> {
        let Some((salt, ciphertext)) = data.split_first_chunk::<MESSAGE_SALT_LEN>() else {
            return Err(CryptoError::format("session message shorter than salt"));
        };
        Ok(Self { salt: *salt, ciphertext: ciphertext.to_vec() })
    }
}

/// Established forward-secure session.
///
/// No internal locking. Callers sharing a session across threads must
/// serialize access themselves.
pub struct Session {
    initiator_key: [u8; DIRECTION_KEY_LEN],
    responder_key: [u8; DIRECTION_KEY_LEN],
    additional_data: [u8; 32],
    session_id: [u8; SESSION_ID_LEN],
    role: Role,
}

impl Session {
    /// Derive session keys from concatenated DH outputs.
    pub(crate) fn establish(dh: &[u8], caller_ad: &[u8], role: Role) -> Result<Self, CryptoError> {
        let mut hasher = Sha256::new();
        hasher.update(caller_ad);
        hasher.update(SESSION_LABEL);
        let additional_data: [u8; 32] = hasher.finalize().into();

        let mut input = Zeroizing::new(Vec::with_capacity(dh.len() + additional_data.len()));
        input.extend_from_slice(dh);
        input.extend_from_slice(&additional_data);
        let material = Zeroizing::new(kdf2::<Sha512>(&input, 2 * DIRECTION_KEY_LEN)?);

        let mut hasher = Sha256::new();
        hasher.update(material.as_slice());
        hasher.update(additional_data);
        hasher.update(SESSION_LABEL);
        let session_id: [u8; SESSION_ID_LEN] = hasher.finalize().into();

        let mut initiator_key = [0u8; DIRECTION_KEY_LEN];
        let mut responder_key = [0u8; DIRECTION_KEY_LEN];
        initiator_key.copy_from_slice(&material[..DIRECTION_KEY_LEN]);
        responder_key.copy_from_slice(&material[DIRECTION_KEY_LEN..]);

        Ok(Self { initiator_key, responder_key, additional_data, session_id, role })
    }

    /// Session identifier, equal on both sides of a matching handshake.
    pub fn session_id(&self) -> &[u8; SESSION_ID_LEN] {
        &self.session_id
    }

    /// AD bound into every message: SHA-256 of the caller's AD and a label.
    pub fn additional_data(&self) -> &[u8; 32] {
        &self.additional_data
    }

    /// Which side of the handshake this session represents.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Override the role.
    ///
    /// Only useful for restoring state by hand; a flipped role swaps the
    /// send and receive keys and breaks decryption of every valid message.
    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    /// Encrypt one message under a fresh salt.
    pub fn encrypt(
        &self,
        env: &impl Environment,
        plaintext: &[u8],
    ) -> Result<SessionMessage, CryptoError> {
        let salt: [u8; MESSAGE_SALT_LEN] = env.random_array()?;
        let (cipher, nonce) = self.message_cipher(self.send_key(), &salt)?;

        let ciphertext = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad: &self.additional_data })
            .map_err(|_| CryptoError::InvalidParameter {
                reason: "session message too large".into(),
            })?;

        Ok(SessionMessage { salt, ciphertext })
    }

    /// Decrypt a message from the other side.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` for tampering, a foreign session, or a
    ///   mismatched role
    pub fn decrypt(&self, message: &SessionMessage) -> Result<Vec<u8>, CryptoError> {
        let (cipher, nonce) = self.message_cipher(self.receive_key(), &message.salt)?;
        cipher
            .decrypt(&nonce, Payload { msg: &message.ciphertext, aad: &self.additional_data })
            .map_err(|_| CryptoError::AuthenticationFailed { operation: "session decrypt" })
    }

    /// Serialize for a storage collaborator. The output contains key material.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let snapshot = SessionSnapshot {
            version: SNAPSHOT_VERSION,
            role: self.role,
            initiator_key: self.initiator_key.to_vec(),
            responder_key: self.responder_key.to_vec(),
            additional_data: self.additional_data.to_vec(),
            session_id: self.session_id.to_vec(),
        };
        let mut out = Zeroizing::new(Vec::new());
        ciborium::into_writer(&snapshot, &mut *out)
            .map_err(|e| CryptoError::format(format!("session snapshot encoding failed: {e}")))?;
        Ok(out)
    }

    /// Restore a session from [`Session::to_bytes`] output.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        let snapshot: SessionSnapshot = ciborium::from_reader(data)
            .map_err(|e| CryptoError::format(format!("session snapshot: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CryptoError::format(format!(
                "unsupported session snapshot version {}",
                snapshot.version
            )));
        }

        Ok(Self {
            initiator_key: fixed(&snapshot.initiator_key, "initiator key")?,
            responder_key: fixed(&snapshot.responder_key, "responder key")?,
            additional_data: fixed(&snapshot.additional_data, "additional data")?,
            session_id: fixed(&snapshot.session_id, "session id")?,
            role: snapshot.role,
        })
    }

    fn send_key(&self) -> &[u8; DIRECTION_KEY_LEN] {
        match self.role {
            Role::Initiator => &self.initiator_key,
            Role::Responder => &self.responder_key,
        }
    }

    fn receive_key(&self) -> &[u8; DIRECTION_KEY_LEN] {
        match self.role {
            Role::Initiator => &self.responder_key,
            Role::Responder => &self.initiator_key,
        }
    }

    fn message_cipher(
        &self,
        direction_key: &[u8; DIRECTION_KEY_LEN],
        salt: &[u8; MESSAGE_SALT_LEN],
    ) -> Result<(XChaCha20Poly1305, XNonce), CryptoError> {
        let mut input =
            Zeroizing::new(Vec::with_capacity(DIRECTION_KEY_LEN + MESSAGE_SALT_LEN + 32));
        input.extend_from_slice(direction_key);
        input.extend_from_slice(salt);
        input.extend_from_slice(&self.additional_data);

        let okm = Zeroizing::new(kdf2::<Sha256>(&input, MESSAGE_KEY_LEN + MESSAGE_NONCE_LEN)?);
        let Ok(cipher) = XChaCha20Poly1305::new_from_slice(&okm[..MESSAGE_KEY_LEN]) else {
            unreachable!("message key is 32 bytes")
        };
        let nonce = *XNonce::from_slice(&okm[MESSAGE_KEY_LEN..]);
        Ok((cipher, nonce))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &hex::encode(self.session_id))
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.initiator_key.zeroize();
        self.responder_key.zeroize();
    }
}

#[derive(Serialize, Deserialize)]
struct SessionSnapshot {
    version: u8,
    role: Role,
    initiator_key: Vec<u8>,
    responder_key: Vec<u8>,
    additional_data: Vec<u8>,
    session_id: Vec<u8>,
}

impl Drop for SessionSnapshot {
    fn drop(&mut self) {
        self.initiator_key.zeroize();
        self.responder_key.zeroize();
    }
}

fn fixed<const N: usize>(bytes: &[u8], field: &str) -> Result<[u8; N], CryptoError> {
    <[u8; N]>::try_from(bytes).map_err(|_| {
        CryptoError::format(format!(
            "session snapshot {field}: expected {N} bytes, got {}",
            bytes.len()
        ))
    })
}
