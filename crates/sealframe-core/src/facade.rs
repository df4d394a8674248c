//! The `Crypto` facade.
//!
//! One surface over key handling, envelopes, signatures, segmented AEAD and
//! PFS sessions. Every operation resolves its capability-typed key arguments
//! before doing any cryptographic work, then reports its outcome to the
//! configured [`DiagnosticSink`](crate::DiagnosticSink).

use std::{
    fmt,
    io::{Read, Write},
};

use sealframe_crypto::{
    ChunkCipher, CryptoError, Ed25519PrivateKey, Ed25519PublicKey, EnvelopeCipher, Environment,
    InitiatorHello, KeyId, PrekeyBundle, Recipient, ResponderKeys, Session, SessionMessage,
    StreamCipher, SystemEnv,
    aead::{AES_KEY_LEN, AES_NONCE_LEN},
    key_export, receive_session, signature, start_session,
};

use crate::{
    config::CryptoConfig,
    diagnostics::{DiagnosticEvent, LogLevel},
    keys::{Keypair, PrivateKey, PublicKey, resolve_all},
};

/// An envelope recipient as the facade sees it.
#[derive(Clone, Copy)]
pub enum EnvelopeRecipient<'a> {
    /// Holder of the matching private key
    Key(&'a PublicKey),
    /// Anyone who knows the password
    Password(&'a [u8]),
}

impl fmt::Debug for EnvelopeRecipient<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Password(_) => f.write_str("Password(..)"),
        }
    }
}

/// The responder's published prekeys, as seen by the initiator.
#[derive(Debug, Clone, Copy)]
pub struct PeerPrekeys<'a> {
    /// Responder identity key
    pub identity: &'a PublicKey,
    /// Responder long-term prekey
    pub long_term: &'a PublicKey,
    /// Responder one-time prekey, if one was handed out
    pub one_time: Option<&'a PublicKey>,
}

/// The responder's own prekeys.
#[derive(Debug, Clone, Copy)]
pub struct OwnPrekeys<'a> {
    /// Identity key
    pub identity: &'a PrivateKey,
    /// Long-term prekey
    pub long_term: &'a PrivateKey,
    /// One-time prekey the initiator used, if any
    pub one_time: Option<&'a PrivateKey>,
}

impl PeerPrekeys<'_> {
    fn bundle(&self, operation: &'static str) -> Result<PrekeyBundle, CryptoError> {
        Ok(PrekeyBundle {
            identity: *self.identity.resolve(operation)?,
            long_term: *self.long_term.resolve(operation)?,
            one_time: self.one_time.map(|key| key.resolve(operation).copied()).transpose()?,
        })
    }
}

impl<'a> OwnPrekeys<'a> {
    fn responder_keys(&self, operation: &'static str) -> Result<ResponderKeys<'a>, CryptoError> {
        Ok(ResponderKeys {
            identity: self.identity.resolve(operation)?,
            long_term: self.long_term.resolve(operation)?,
            one_time: self.one_time.map(|key| key.resolve(operation)).transpose()?,
        })
    }
}

/// Cryptographic facade.
///
/// Stateless apart from its configuration; safe to share across threads.
pub struct Crypto<E: Environment> {
    env: E,
    config: CryptoConfig,
    envelope: EnvelopeCipher<E>,
    stream: StreamCipher,
    chunk: ChunkCipher,
}

impl Crypto<SystemEnv> {
    /// Facade backed by the OS entropy source.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if a configured segment size is unusable
    pub fn new(config: CryptoConfig) -> Result<Self, CryptoError> {
        Self::with_env(SystemEnv::new(), config)
    }
}

impl<E: Environment> Crypto<E> {
    /// Facade over a caller-supplied environment.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if a configured segment size is unusable
    pub fn with_env(env: E, config: CryptoConfig) -> Result<Self, CryptoError> {
        let (stream, chunk) = config.ciphers()?;
        let envelope = EnvelopeCipher::new(env.clone())
            .with_fingerprint(config.fingerprint)
            .with_password_kdf(config.password_kdf)
            .with_stream_cipher(stream);

        Ok(Self { env, config, envelope, stream, chunk })
    }

    /// Active configuration.
    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    // Keys

    /// Generate a fresh Ed25519 keypair.
    pub fn generate_keypair(&self) -> Result<Keypair, CryptoError> {
        let result = Ed25519PrivateKey::generate(&self.env).and_then(|private| {
            let public = private.public_key()?;
            Ok(Keypair::new(private.into(), public.into()))
        });
        let id = result.as_ref().ok().and_then(|pair| self.public_id(pair.public_key()));
        self.report("generate keypair", id.as_ref(), result)
    }

    /// Import a private key exported with [`export_private_key`](Self::export_private_key).
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` for a wrong password or tampered data
    /// - `InvalidKey` for truncated input
    pub fn import_private_key(
        &self,
        data: &[u8],
        password: &[u8],
    ) -> Result<PrivateKey, CryptoError> {
        let result = key_export::import_private_key(data, password).map(PrivateKey::from);
        let id = result.as_ref().ok().and_then(|key| self.private_id(key));
        self.report("import private key", id.as_ref(), result)
    }

    /// Encrypt a private key at rest under a password.
    pub fn export_private_key(
        &self,
        key: &PrivateKey,
        password: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let result = key
            .resolve("export private key")
            .and_then(|key| key_export::export_private_key(&self.env, key, password));
        self.report("export private key", self.private_id(key).as_ref(), result)
    }

    /// Decode a public key from its tagged encoding.
    ///
    /// # Errors
    ///
    /// - `UnsupportedKeyType` for an unknown algorithm tag
    /// - `InvalidKey` for a wrong length or an invalid point
    pub fn import_public_key(&self, data: &[u8]) -> Result<PublicKey, CryptoError> {
        let result = Ed25519PublicKey::decode(data).map(PublicKey::from);
        let id = result.as_ref().ok().and_then(|key| self.public_id(key));
        self.report("import public key", id.as_ref(), result)
    }

    /// Tagged encoding of a public key.
    pub fn export_public_key(&self, key: &PublicKey) -> Result<Vec<u8>, CryptoError> {
        let result = key.resolve("export public key").map(Ed25519PublicKey::encode);
        self.report("export public key", self.public_id(key).as_ref(), result)
    }

    /// Public key belonging to a private key.
    pub fn extract_public_key(&self, key: &PrivateKey) -> Result<PublicKey, CryptoError> {
        let result = key
            .resolve("extract public key")
            .and_then(Ed25519PrivateKey::public_key)
            .map(PublicKey::from);
        let id = result.as_ref().ok().and_then(|key| self.public_id(key));
        self.report("extract public key", id.as_ref(), result)
    }

    /// Fingerprint of arbitrary bytes under the configured hash.
    pub fn calculate_fingerprint(&self, data: &[u8]) -> Vec<u8> {
        self.config.fingerprint.fingerprint(data)
    }

    /// Recipient identifier of a public key.
    pub fn key_identifier(&self, key: &PublicKey) -> Result<KeyId, CryptoError> {
        let result = key
            .resolve("key identifier")
            .map(|key| key.identifier(self.config.fingerprint));
        let id = result.as_ref().ok().cloned();
        self.report("key identifier", id.as_ref(), result)
    }

    // Envelopes

    /// Encrypt `data` for every listed public key.
    ///
    /// # Errors
    ///
    /// - `UnsupportedKeyType` / `InvalidKey` for an unusable recipient key
    /// - `InvalidParameter` if `recipients` is empty
    pub fn encrypt(&self, data: &[u8], recipients: &[&PublicKey]) -> Result<Vec<u8>, CryptoError> {
        let result = resolve_all(recipients, "encrypt").and_then(|keys| {
            let recipients: Vec<_> = keys.into_iter().map(Recipient::Key).collect();
            self.envelope.encrypt(data, &recipients)
        });
        self.report("encrypt", None, result)
    }

    /// Encrypt `data` for any mix of key and password recipients.
    pub fn encrypt_for(
        &self,
        data: &[u8],
        recipients: &[EnvelopeRecipient<'_>],
    ) -> Result<Vec<u8>, CryptoError> {
        let result = resolve_recipients(recipients, "encrypt")
            .and_then(|recipients| self.envelope.encrypt(data, &recipients));
        self.report("encrypt", None, result)
    }

    /// Decrypt an envelope addressed to `key`.
    ///
    /// # Errors
    ///
    /// - `RecipientNotFound` if no entry matches the key
    /// - `AuthenticationFailed` if the envelope was tampered with
    pub fn decrypt(&self, data: &[u8], key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
        let result = key.resolve("decrypt").and_then(|key| self.envelope.decrypt(data, key));
        self.report("decrypt", self.private_id(key).as_ref(), result)
    }

    /// Decrypt an envelope through one of its password entries.
    pub fn decrypt_with_password(
        &self,
        data: &[u8],
        password: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let result = self.envelope.decrypt_with_password(data, password);
        self.report("decrypt with password", None, result)
    }

    /// Sign `data` with `signer`, then encrypt it and the signature.
    pub fn sign_then_encrypt(
        &self,
        data: &[u8],
        signer: &PrivateKey,
        recipients: &[&PublicKey],
    ) -> Result<Vec<u8>, CryptoError> {
        let result = signer.resolve("sign then encrypt").and_then(|signer| {
            let keys = resolve_all(recipients, "sign then encrypt")?;
            let recipients: Vec<_> = keys.into_iter().map(Recipient::Key).collect();
            self.envelope.sign_then_encrypt(data, signer, &recipients)
        });
        self.report("sign then encrypt", self.private_id(signer).as_ref(), result)
    }

    /// Decrypt, then check the embedded signature against each verifier in
    /// order.
    ///
    /// # Errors
    ///
    /// - `SignatureVerificationFailed` if no verifier matches, the list is
    ///   empty, or the envelope is unsigned
    pub fn decrypt_then_verify(
        &self,
        data: &[u8],
        key: &PrivateKey,
        verifiers: &[&PublicKey],
    ) -> Result<Vec<u8>, CryptoError> {
        let result = key.resolve("decrypt then verify").and_then(|key| {
            let verifiers: Vec<Ed25519PublicKey> = resolve_all(verifiers, "decrypt then verify")?
                .into_iter()
                .copied()
                .collect();
            self.envelope.decrypt_then_verify(data, key, &verifiers)
        });
        self.report("decrypt then verify", self.private_id(key).as_ref(), result)
    }

    /// Streaming variant of [`encrypt_for`](Self::encrypt_for).
    ///
    /// Returns the number of plaintext bytes consumed.
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        recipients: &[EnvelopeRecipient<'_>],
    ) -> Result<u64, CryptoError> {
        let result = resolve_recipients(recipients, "encrypt stream")
            .and_then(|recipients| self.envelope.encrypt_stream(reader, writer, &recipients));
        self.report("encrypt stream", None, result)
    }

    /// Streaming variant of [`decrypt`](Self::decrypt).
    ///
    /// Plaintext is written as each segment verifies. On error, whatever
    /// was already written must be discarded.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        key: &PrivateKey,
    ) -> Result<u64, CryptoError> {
        let result = key
            .resolve("decrypt stream")
            .and_then(|key| self.envelope.decrypt_stream(reader, writer, key));
        self.report("decrypt stream", self.private_id(key).as_ref(), result)
    }

    /// Streaming variant of [`decrypt_with_password`](Self::decrypt_with_password).
    pub fn decrypt_stream_with_password<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        password: &[u8],
    ) -> Result<u64, CryptoError> {
        let result = self.envelope.decrypt_stream_with_password(reader, writer, password);
        self.report("decrypt stream with password", None, result)
    }

    /// Streaming variant of [`sign_then_encrypt`](Self::sign_then_encrypt).
    ///
    /// Signs the SHA-512 digest of the stream; the encrypted signature
    /// follows the body. Returns the number of plaintext bytes consumed.
    pub fn sign_then_encrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        signer: &PrivateKey,
        recipients: &[EnvelopeRecipient<'_>],
    ) -> Result<u64, CryptoError> {
        const OP: &str = "sign then encrypt stream";

        let result = signer.resolve(OP).and_then(|signer| {
            let recipients = resolve_recipients(recipients, OP)?;
            self.envelope.sign_then_encrypt_stream(reader, writer, signer, &recipients)
        });
        self.report(OP, self.private_id(signer).as_ref(), result)
    }

    /// Streaming variant of [`decrypt_then_verify`](Self::decrypt_then_verify).
    ///
    /// The signature is checked only after the whole body has been
    /// written. On error, whatever was already written must be discarded.
    ///
    /// # Errors
    ///
    /// - `SignatureVerificationFailed` if no verifier matches, the list is
    ///   empty, or the envelope is not a signed stream
    pub fn decrypt_then_verify_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        key: &PrivateKey,
        verifiers: &[&PublicKey],
    ) -> Result<u64, CryptoError> {
        const OP: &str = "decrypt then verify stream";

        let result = key.resolve(OP).and_then(|key| {
            let verifiers: Vec<Ed25519PublicKey> =
                resolve_all(verifiers, OP)?.into_iter().copied().collect();
            self.envelope.decrypt_then_verify_stream(reader, writer, key, &verifiers)
        });
        self.report(OP, self.private_id(key).as_ref(), result)
    }

    // Signatures

    /// Detached Ed25519 signature over `data`.
    pub fn sign(&self, data: &[u8], key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
        let result = key
            .resolve("sign")
            .and_then(|key| signature::sign(data, key))
            .map(|sig| sig.to_vec());
        self.report("sign", self.private_id(key).as_ref(), result)
    }

    /// Check a detached signature.
    ///
    /// # Errors
    ///
    /// - `SignatureVerificationFailed` on mismatch or a malformed signature
    pub fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        key: &PublicKey,
    ) -> Result<(), CryptoError> {
        let result = key
            .resolve("verify")
            .and_then(|key| signature::verify(data, signature, key));
        self.report("verify", self.public_id(key).as_ref(), result)
    }

    /// Signature over the SHA-512 digest of a stream.
    pub fn sign_stream<R: Read>(
        &self,
        reader: &mut R,
        key: &PrivateKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let result = key
            .resolve("sign stream")
            .and_then(|key| signature::sign_stream(reader, key))
            .map(|sig| sig.to_vec());
        self.report("sign stream", self.private_id(key).as_ref(), result)
    }

    /// Check a signature produced by [`sign_stream`](Self::sign_stream).
    pub fn verify_stream<R: Read>(
        &self,
        reader: &mut R,
        signature: &[u8],
        key: &PublicKey,
    ) -> Result<(), CryptoError> {
        let result = key
            .resolve("verify stream")
            .and_then(|key| signature::verify_stream(reader, signature, key));
        self.report("verify stream", self.public_id(key).as_ref(), result)
    }

    // Large payloads

    /// Chunked AEAD with the configured chunk size.
    pub fn chunk_encrypt<R: Read, W: Write>(
        &self,
        key: &[u8; AES_KEY_LEN],
        nonce: &[u8; AES_NONCE_LEN],
        additional_data: &[u8],
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, CryptoError> {
        let result = self.chunk.encrypt(key, nonce, additional_data, reader, writer);
        self.report("chunk encrypt", None, result)
    }

    /// Inverse of [`chunk_encrypt`](Self::chunk_encrypt).
    ///
    /// Each chunk is written as soon as it verifies; the first bad chunk
    /// stops the decode with every earlier chunk already written.
    pub fn chunk_decrypt<R: Read, W: Write>(
        &self,
        key: &[u8; AES_KEY_LEN],
        nonce: &[u8; AES_NONCE_LEN],
        additional_data: &[u8],
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, CryptoError> {
        let result = self.chunk.decrypt(key, nonce, additional_data, reader, writer);
        self.report("chunk decrypt", None, result)
    }

    /// Streaming AEAD with the configured buffer size.
    pub fn stream_encrypt<R: Read, W: Write>(
        &self,
        key: &[u8; AES_KEY_LEN],
        nonce: &[u8; AES_NONCE_LEN],
        additional_data: &[u8],
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, CryptoError> {
        let result = self.stream.encrypt(key, nonce, additional_data, reader, writer);
        self.report("stream encrypt", None, result)
    }

    /// Inverse of [`stream_encrypt`](Self::stream_encrypt).
    pub fn stream_decrypt<R: Read, W: Write>(
        &self,
        key: &[u8; AES_KEY_LEN],
        nonce: &[u8; AES_NONCE_LEN],
        additional_data: &[u8],
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, CryptoError> {
        let result = self.stream.decrypt(key, nonce, additional_data, reader, writer);
        self.report("stream decrypt", None, result)
    }

    // Sessions

    /// Initiator side of the handshake.
    ///
    /// `ephemeral` must be freshly generated for this session and dropped
    /// afterwards.
    pub fn start_pfs_session(
        &self,
        identity: &PrivateKey,
        ephemeral: &PrivateKey,
        peer: &PeerPrekeys<'_>,
        additional_data: &[u8],
    ) -> Result<Session, CryptoError> {
        const OP: &str = "start pfs session";
        let result = peer.bundle(OP).and_then(|bundle| {
            start_session(identity.resolve(OP)?, ephemeral.resolve(OP)?, &bundle, additional_data)
        });
        self.report(OP, self.public_id(peer.identity).as_ref(), result)
    }

    /// Responder side of the handshake.
    pub fn receive_pfs_session(
        &self,
        own: &OwnPrekeys<'_>,
        initiator_identity: &PublicKey,
        initiator_ephemeral: &PublicKey,
        additional_data: &[u8],
    ) -> Result<Session, CryptoError> {
        const OP: &str = "receive pfs session";
        let result = own.responder_keys(OP).and_then(|keys| {
            let hello = InitiatorHello {
                identity: *initiator_identity.resolve(OP)?,
                ephemeral: *initiator_ephemeral.resolve(OP)?,
            };
            receive_session(&keys, &hello, additional_data)
        });
        self.report(OP, self.public_id(initiator_identity).as_ref(), result)
    }

    /// Encrypt one session message with a salt from this facade's
    /// environment.
    pub fn session_encrypt(
        &self,
        session: &Session,
        plaintext: &[u8],
    ) -> Result<SessionMessage, CryptoError> {
        let result = session.encrypt(&self.env, plaintext);
        self.report("session encrypt", None, result)
    }

    /// Decrypt one session message.
    pub fn session_decrypt(
        &self,
        session: &Session,
        message: &SessionMessage,
    ) -> Result<Vec<u8>, CryptoError> {
        let result = session.decrypt(message);
        self.report("session decrypt", None, result)
    }

    // Diagnostics

    fn public_id(&self, key: &PublicKey) -> Option<KeyId> {
        self.config.diagnostics.as_ref()?;
        match key {
            PublicKey::Ed25519(key) if !key.is_empty() => {
                Some(key.identifier(self.config.fingerprint))
            },
            _ => None,
        }
    }

    fn private_id(&self, key: &PrivateKey) -> Option<KeyId> {
        self.config.diagnostics.as_ref()?;
        match key {
            PrivateKey::Ed25519(key) if !key.is_empty() => {
                key.public_key().ok().map(|public| public.identifier(self.config.fingerprint))
            },
            _ => None,
        }
    }

    fn report<T>(
        &self,
        operation: &'static str,
        key_id: Option<&KeyId>,
        result: Result<T, CryptoError>,
    ) -> Result<T, CryptoError> {
        let Some(sink) = &self.config.diagnostics else {
            return result;
        };

        match &result {
            Ok(_) => sink.record(&DiagnosticEvent {
                level: LogLevel::Debug,
                operation,
                key_id,
                message: "ok",
            }),
            Err(error) => {
                let level = match error {
                    CryptoError::RandomSource { .. } | CryptoError::Io { .. } => LogLevel::Error,
                    _ => LogLevel::Warn,
                };
                let message = error.to_string();
                sink.record(&DiagnosticEvent { level, operation, key_id, message: &message });
            },
        }
        result
    }
}

impl<E: Environment> fmt::Debug for Crypto<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crypto").field("config", &self.config).finish_non_exhaustive()
    }
}

fn resolve_recipients<'a>(
    recipients: &[EnvelopeRecipient<'a>],
    operation: &'static str,
) -> Result<Vec<Recipient<'a>>, CryptoError> {
    recipients
        .iter()
        .map(|recipient| match *recipient {
            EnvelopeRecipient::Key(key) => key.resolve(operation).map(Recipient::Key),
            EnvelopeRecipient::Password(password) => Ok(Recipient::Password(password)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    use sealframe_crypto::{PasswordKdf, SystemEnv};

    use super::*;
    use crate::{DiagnosticSink, keys::ForeignKey};

    #[derive(Debug, Default)]
    struct RecordingSink {
        events: Mutex<Vec<(LogLevel, &'static str, Option<String>, String)>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn record(&self, event: &DiagnosticEvent<'_>) {
            self.events.lock().unwrap().push((
                event.level,
                event.operation,
                event.key_id.map(ToString::to_string),
                event.message.to_string(),
            ));
        }
    }

    fn fast_config() -> CryptoConfig {
        CryptoConfig {
            password_kdf: PasswordKdf { memory_kib: 64, iterations: 1, parallelism: 1 },
            ..CryptoConfig::default()
        }
    }

    fn crypto() -> Crypto<SystemEnv> {
        Crypto::new(fast_config()).unwrap()
    }

    fn foreign() -> PublicKey {
        PublicKey::Foreign(ForeignKey::new("rsa-4096", vec![1; 16]))
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let crypto = crypto();
        let alice = crypto.generate_keypair().unwrap();
        let bob = crypto.generate_keypair().unwrap();

        let sealed = crypto.encrypt(b"hello", &[alice.public_key(), bob.public_key()]).unwrap();

        assert_eq!(crypto.decrypt(&sealed, alice.private_key()).unwrap(), b"hello");
        assert_eq!(crypto.decrypt(&sealed, bob.private_key()).unwrap(), b"hello");
    }

    #[test]
    fn foreign_recipient_rejected_before_work() {
        let crypto = crypto();
        let alice = crypto.generate_keypair().unwrap();
        let foreign = foreign();

        let result = crypto.encrypt(b"data", &[alice.public_key(), &foreign]);
        assert_eq!(
            result,
            Err(CryptoError::UnsupportedKeyType {
                operation: "encrypt",
                algorithm: "rsa-4096".to_string(),
            })
        );
    }

    #[test]
    fn empty_private_key_rejected() {
        let crypto = crypto();
        let empty = PrivateKey::Ed25519(Ed25519PrivateKey::default());

        assert!(matches!(crypto.sign(b"data", &empty), Err(CryptoError::InvalidKey { .. })));
        assert!(matches!(crypto.decrypt(b"data", &empty), Err(CryptoError::InvalidKey { .. })));
        assert!(matches!(crypto.extract_public_key(&empty), Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn mixed_recipients() {
        let crypto = crypto();
        let alice = crypto.generate_keypair().unwrap();

        let recipients =
            [EnvelopeRecipient::Key(alice.public_key()), EnvelopeRecipient::Password(b"hunter2")];
        let sealed = crypto.encrypt_for(b"mixed", &recipients).unwrap();

        assert_eq!(crypto.decrypt(&sealed, alice.private_key()).unwrap(), b"mixed");
        assert_eq!(crypto.decrypt_with_password(&sealed, b"hunter2").unwrap(), b"mixed");
    }

    #[test]
    fn public_key_export_import() {
        let crypto = crypto();
        let pair = crypto.generate_keypair().unwrap();

        let encoded = crypto.export_public_key(pair.public_key()).unwrap();
        assert_eq!(encoded[0], 0x01);
        assert_eq!(&crypto.import_public_key(&encoded).unwrap(), pair.public_key());

        let mut unknown = encoded.clone();
        unknown[0] = 0x7F;
        assert!(matches!(
            crypto.import_public_key(&unknown),
            Err(CryptoError::UnsupportedKeyType { .. })
        ));
        assert!(matches!(
            crypto.import_public_key(&encoded[..10]),
            Err(CryptoError::InvalidKey { .. })
        ));
    }

    #[test]
    fn identifier_is_fingerprint_of_encoding() {
        let crypto = crypto();
        let pair = crypto.generate_keypair().unwrap();

        let encoded = crypto.export_public_key(pair.public_key()).unwrap();
        let id = crypto.key_identifier(pair.public_key()).unwrap();
        assert_eq!(id.as_bytes(), crypto.calculate_fingerprint(&encoded).as_slice());
    }

    #[test]
    fn stream_signature_matches_stream() {
        let crypto = crypto();
        let pair = crypto.generate_keypair().unwrap();
        let data = vec![7u8; 20_000];

        let sig = crypto.sign_stream(&mut Cursor::new(&data), pair.private_key()).unwrap();
        crypto.verify_stream(&mut Cursor::new(&data), &sig, pair.public_key()).unwrap();

        let mut other = data.clone();
        other[19_999] ^= 1;
        assert!(matches!(
            crypto.verify_stream(&mut Cursor::new(&other), &sig, pair.public_key()),
            Err(CryptoError::SignatureVerificationFailed { .. })
        ));
    }

    #[test]
    fn stream_envelope_reports_plaintext_length() {
        let crypto = crypto();
        let alice = crypto.generate_keypair().unwrap();
        let data = vec![0x3Cu8; 100_000];

        let mut sealed = Vec::new();
        let recipients =
            [EnvelopeRecipient::Key(alice.public_key()), EnvelopeRecipient::Password(b"pw")];
        let consumed =
            crypto.encrypt_stream(&mut Cursor::new(&data), &mut sealed, &recipients).unwrap();
        assert_eq!(consumed, data.len() as u64);

        let mut out = Vec::new();
        let key = alice.private_key();
        let written = crypto.decrypt_stream(&mut Cursor::new(&sealed), &mut out, key).unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(out, data);

        let mut out = Vec::new();
        let written = crypto
            .decrypt_stream_with_password(&mut Cursor::new(&sealed), &mut out, b"pw")
            .unwrap();
        assert_eq!(written, data.len() as u64);

        // A buffered envelope read through the streaming path.
        let sealed = crypto.encrypt(b"short", &[alice.public_key()]).unwrap();
        let mut out = Vec::new();
        let written = crypto.decrypt_stream(&mut Cursor::new(&sealed), &mut out, key).unwrap();
        assert_eq!(written, 5);
    }

    #[test]
    fn signed_stream_through_facade() {
        let crypto = crypto();
        let signer = crypto.generate_keypair().unwrap();
        let reader = crypto.generate_keypair().unwrap();
        let stranger = crypto.generate_keypair().unwrap();
        let data = vec![0xC3u8; 70_000];

        let mut sealed = Vec::new();
        let consumed = crypto
            .sign_then_encrypt_stream(
                &mut Cursor::new(&data),
                &mut sealed,
                signer.private_key(),
                &[EnvelopeRecipient::Key(reader.public_key())],
            )
            .unwrap();
        assert_eq!(consumed, data.len() as u64);

        let mut out = Vec::new();
        let written = crypto
            .decrypt_then_verify_stream(
                &mut Cursor::new(&sealed),
                &mut out,
                reader.private_key(),
                &[stranger.public_key(), signer.public_key()],
            )
            .unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(out, data);

        let result = crypto.decrypt_then_verify_stream(
            &mut Cursor::new(&sealed),
            &mut Vec::new(),
            reader.private_key(),
            &[stranger.public_key()],
        );
        assert!(matches!(result, Err(CryptoError::SignatureVerificationFailed { .. })));

        let result = crypto.decrypt_then_verify_stream(
            &mut Cursor::new(&sealed),
            &mut Vec::new(),
            reader.private_key(),
            &[&foreign()],
        );
        assert!(matches!(result, Err(CryptoError::UnsupportedKeyType { .. })));
    }

    #[test]
    fn facade_uses_configured_chunk_size() {
        let config = CryptoConfig { chunk_size: 8, ..fast_config() };
        let crypto = Crypto::new(config).unwrap();
        let key = [3u8; AES_KEY_LEN];
        let nonce = [4u8; AES_NONCE_LEN];

        let mut sealed = Vec::new();
        let mut source = Cursor::new(&[9u8; 20]);
        crypto.chunk_encrypt(&key, &nonce, b"ad", &mut source, &mut sealed).unwrap();
        // Three chunks of 8, 8 and 4 bytes, each with prefix and tag.
        assert_eq!(sealed.len(), 3 * (4 + 16) + 20);

        let mut opened = Vec::new();
        crypto.chunk_decrypt(&key, &nonce, b"ad", &mut Cursor::new(&sealed), &mut opened).unwrap();
        assert_eq!(opened, [9u8; 20]);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = CryptoConfig { stream_buffer_size: 0, ..CryptoConfig::default() };
        assert!(matches!(Crypto::new(config), Err(CryptoError::InvalidParameter { .. })));
    }

    #[test]
    fn diagnostics_carry_operation_and_key_id() {
        let sink = Arc::new(RecordingSink::default());
        let crypto = Crypto::new(fast_config().with_diagnostics(sink.clone())).unwrap();
        let alice = crypto.generate_keypair().unwrap();
        let bob = crypto.generate_keypair().unwrap();
        let bob_id = crypto.key_identifier(bob.public_key()).unwrap().to_string();

        let sealed = crypto.encrypt(b"secret plaintext", &[alice.public_key()]).unwrap();
        let _ = crypto.decrypt(&sealed, bob.private_key());

        let events = sink.events.lock().unwrap();
        let (level, operation, key_id, message) = events.last().unwrap();
        assert_eq!(*level, LogLevel::Warn);
        assert_eq!(*operation, "decrypt");
        assert_eq!(key_id.as_deref(), Some(bob_id.as_str()));
        assert!(message.contains("recipient not found"), "{message}");

        for (_, _, _, message) in events.iter() {
            assert!(!message.contains("secret plaintext"));
        }
    }

    #[test]
    fn no_sink_no_key_id_work() {
        let crypto = crypto();
        let pair = crypto.generate_keypair().unwrap();
        assert!(crypto.public_id(pair.public_key()).is_none());
        assert!(crypto.private_id(pair.private_key()).is_none());
    }
}
