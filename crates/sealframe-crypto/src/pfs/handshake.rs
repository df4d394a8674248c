//! X3DH-style session handshake.
//!
//! The responder publishes an identity key, a long-term prekey and optionally
//! a one-time prekey. The initiator combines them with its own identity key
//! and a fresh ephemeral key:
//!
//! ```text
//! dh1 = DH(IK_a, LTK_b)
//! dh2 = DH(EK_a, IK_b)
//! dh3 = DH(EK_a, LTK_b)
//! dh4 = DH(EK_a, OTK_b)     only when a one-time prekey is used
//! ```
//!
//! Both sides must agree on whether the one-time prekey took part. If only
//! one side includes it the handshake still "succeeds" and the sessions
//! differ; the mismatch only shows up as failed decryption.

use zeroize::Zeroizing;

use super::session::{Role, Session};
use crate::{
    error::CryptoError,
    keys::{Ed25519PrivateKey, Ed25519PublicKey, KEY_LEN},
};

/// Responder's published keys, as fetched by the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrekeyBundle {
    /// Responder identity key (IK_b)
    pub identity: Ed25519PublicKey,
    /// Responder long-term prekey (LTK_b)
    pub long_term: Ed25519PublicKey,
    /// Responder one-time prekey (OTK_b), if one was handed out
    pub one_time: Option<Ed25519PublicKey>,
}

/// Initiator's public keys, delivered to the responder with the first message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiatorHello {
    /// Initiator identity key (IK_a)
    pub identity: Ed25519PublicKey,
    /// Initiator ephemeral key (EK_a)
    pub ephemeral: Ed25519PublicKey,
}

/// Responder's private prekeys matching a [`PrekeyBundle`].
#[derive(Debug, Clone, Copy)]
pub struct ResponderKeys<'a> {
    /// Responder identity key
    pub identity: &'a Ed25519PrivateKey,
    /// Responder long-term prekey
    pub long_term: &'a Ed25519PrivateKey,
    /// Responder one-time prekey, if the initiator used it
    pub one_time: Option<&'a Ed25519PrivateKey>,
}

/// Start a session as the initiator.
///
/// # Errors
///
/// - `InvalidKey` if any key is empty or an agreement yields a zero secret
pub fn start_session(
    identity: &Ed25519PrivateKey,
    ephemeral: &Ed25519PrivateKey,
    bundle: &PrekeyBundle,
    additional_data: &[u8],
) -> Result<Session, CryptoError> {
    const OP: &str = "start session";

    let mut dh = Zeroizing::new(Vec::with_capacity(4 * KEY_LEN));
    dh.extend_from_slice(&*identity.diffie_hellman(&bundle.long_term, OP)?);
    dh.extend_from_slice(&*ephemeral.diffie_hellman(&bundle.identity, OP)?);
    dh.extend_from_slice(&*ephemeral.diffie_hellman(&bundle.long_term, OP)?);
    if let Some(one_time) = &bundle.one_time {
        dh.extend_from_slice(&*ephemeral.diffie_hellman(one_time, OP)?);
    }

    Session::establish(&dh, additional_data, Role::Initiator)
}

/// Accept a session as the responder.
///
/// # Errors
///
/// - `InvalidKey` if any key is empty or an agreement yields a zero secret
pub fn receive_session(
    keys: &ResponderKeys<'_>,
    hello: &InitiatorHello,
    additional_data: &[u8],
) -> Result<Session, CryptoError> {
    const OP: &str = "receive session";

    let mut dh = Zeroizing::new(Vec::with_capacity(4 * KEY_LEN));
    dh.extend_from_slice(&*keys.long_term.diffie_hellman(&hello.identity, OP)?);
    dh.extend_from_slice(&*keys.identity.diffie_hellman(&hello.ephemeral, OP)?);
    dh.extend_from_slice(&*keys.long_term.diffie_hellman(&hello.ephemeral, OP)?);
    if let Some(one_time) = keys.one_time {
        dh.extend_from_slice(&*one_time.diffie_hellman(&hello.ephemeral, OP)?);
    }

    Session::establish(&dh, additional_data, Role::Responder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{env::SystemEnv, keys::Ed25519Keypair};

    struct Parties {
        alice_identity: Ed25519Keypair,
        alice_ephemeral: Ed25519Keypair,
        bob_identity: Ed25519Keypair,
        bob_long_term: Ed25519Keypair,
        bob_one_time: Ed25519Keypair,
    }

    impl Parties {
        fn new() -> Self {
            let env = SystemEnv::new();
            Self {
                alice_identity: Ed25519Keypair::generate(&env).unwrap(),
                alice_ephemeral: Ed25519Keypair::generate(&env).unwrap(),
                bob_identity: Ed25519Keypair::generate(&env).unwrap(),
                bob_long_term: Ed25519Keypair::generate(&env).unwrap(),
                bob_one_time: Ed25519Keypair::generate(&env).unwrap(),
            }
        }

        fn handshake(&self, initiator_otk: bool, responder_otk: bool) -> (Session, Session) {
            let bundle = PrekeyBundle {
                identity: *self.bob_identity.public_key(),
                long_term: *self.bob_long_term.public_key(),
                one_time: initiator_otk.then(|| *self.bob_one_time.public_key()),
            };
            let alice = start_session(
                self.alice_identity.private_key(),
                self.alice_ephemeral.private_key(),
                &bundle,
                b"alice->bob",
            )
            .unwrap();

            let keys = ResponderKeys {
                identity: self.bob_identity.private_key(),
                long_term: self.bob_long_term.private_key(),
                one_time: responder_otk.then(|| self.bob_one_time.private_key()),
            };
            let hello = InitiatorHello {
                identity: *self.alice_identity.public_key(),
                ephemeral: *self.alice_ephemeral.public_key(),
            };
            let bob = receive_session(&keys, &hello, b"alice->bob").unwrap();
            (alice, bob)
        }
    }

    #[test]
    fn handshake_with_one_time_prekey() {
        let (alice, bob) = Parties::new().handshake(true, true);

        assert_eq!(alice.session_id(), bob.session_id());
        assert_eq!(alice.role(), Role::Initiator);
        assert_eq!(bob.role(), Role::Responder);

        let msg = alice.encrypt(&SystemEnv::new(), b"hi bob").unwrap();
        assert_eq!(bob.decrypt(&msg).unwrap(), b"hi bob");
    }

    #[test]
    fn handshake_without_one_time_prekey() {
        let (alice, bob) = Parties::new().handshake(false, false);

        let msg = bob.encrypt(&SystemEnv::new(), b"hi alice").unwrap();
        assert_eq!(alice.decrypt(&msg).unwrap(), b"hi alice");
    }

    #[test]
    fn one_sided_one_time_prekey_diverges_silently() {
        let parties = Parties::new();
        let (alice, bob) = parties.handshake(true, false);

        assert_ne!(alice.session_id(), bob.session_id());
        let msg = alice.encrypt(&SystemEnv::new(), b"lost").unwrap();
        assert!(matches!(bob.decrypt(&msg), Err(CryptoError::AuthenticationFailed { .. })));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let parties = Parties::new();
        let bundle = PrekeyBundle {
            identity: *parties.bob_identity.public_key(),
            long_term: Ed25519PublicKey::default(),
            one_time: None,
        };

        let result = start_session(
            parties.alice_identity.private_key(),
            parties.alice_ephemeral.private_key(),
            &bundle,
            b"",
        );
        assert!(matches!(result, Err(CryptoError::InvalidKey { .. })));

        let keys = ResponderKeys {
            identity: &Ed25519PrivateKey::default(),
            long_term: parties.bob_long_term.private_key(),
            one_time: None,
        };
        let hello = InitiatorHello {
            identity: *parties.alice_identity.public_key(),
            ephemeral: *parties.alice_ephemeral.public_key(),
        };
        assert!(matches!(receive_session(&keys, &hello, b""), Err(CryptoError::InvalidKey { .. })));
    }
}
