//! Forward-secure sessions: X3DH-style handshake plus salted per-message keys.

mod handshake;
mod session;

pub use handshake::{InitiatorHello, PrekeyBundle, ResponderKeys, receive_session, start_session};
pub use session::{
    DIRECTION_KEY_LEN, MESSAGE_SALT_LEN, Role, SESSION_ID_LEN, Session, SessionMessage,
};
