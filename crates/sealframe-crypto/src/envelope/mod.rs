//! Multi-recipient envelopes.

mod cipher;
pub mod format;
mod recipient;

pub use cipher::EnvelopeCipher;
pub use format::{BodyLayout, EnvelopeHeader, MAX_STREAM_BUFFER_SIZE, RecipientEntry};
pub use recipient::{
    CEK_LEN, MAX_PASSWORD_ITERATIONS, MAX_PASSWORD_MEMORY_KIB, MAX_PASSWORD_PARALLELISM,
    PasswordKdf, Recipient,
};
