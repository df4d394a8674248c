//! KDF2 key derivation (ISO 18033-2 / ANSI X9.63 without shared info).
//!
//! ```text
//! output = H(secret || BE32(1)) || H(secret || BE32(2)) || ...   truncated
//! ```
//!
//! The layout is a wire contract: envelopes and sessions produced by earlier
//! implementations can only be opened if this matches bit for bit. The
//! counter is 4 bytes big-endian and starts at 1.

use sha2::Digest;

use crate::error::CryptoError;

/// Derive `length` bytes from `secret` with hash function `D`.
///
/// Fails only if `length` needs more than `u32::MAX` hash blocks.
pub fn kdf2<D: Digest>(secret: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
    let block_len = <D as Digest>::output_size();
    let blocks = length.div_ceil(block_len);
    let Ok(blocks) = u32::try_from(blocks) else {
        return Err(CryptoError::InvalidParameter {
            reason: format!("kdf2 output of {length} bytes exceeds counter range"),
        });
    };

    let mut output = Vec::with_capacity(blocks as usize * block_len);
    for counter in 1..=blocks {
        let mut hasher = D::new();
        hasher.update(secret);
        hasher.update(counter.to_be_bytes());
        output.extend_from_slice(&hasher.finalize());
    }
    output.truncate(length);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use sha2::{Sha256, Sha384, Sha512};

    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn ansi_x963_sha256_vector() {
        // ANSI X9.63 KDF test vector (SHA-256, no shared info, 128-bit output)
        let z = unhex("96c05619d56c328ab95fe84b18264b08725b85e33fd34f08");
        let derived = kdf2::<Sha256>(&z, 16).unwrap();

        assert_eq!(derived, unhex("443024c3dae66b95e6f5670601558f71"));
    }

    #[test]
    fn multi_block_sha256_vector() {
        let secret: Vec<u8> = (0u8..32).collect();
        let derived = kdf2::<Sha256>(&secret, 80).unwrap();

        assert_eq!(
            derived,
            unhex(
                "04a6950a06d3e3308ad7d3606ef810eb124e3943404ca746a12c51c7bf776839\
                 0f8d842ac9cb62349779a7537a78327d545aaeb33b2d42c7d1dc3680a4b23628\
                 627e9db8ad47bfe76dbe653d03d2c0a3"
            )
        );
    }

    #[test]
    fn sha512_and_sha384_vectors() {
        let secret: Vec<u8> = (0u8..16).collect();

        let derived = kdf2::<Sha512>(&secret, 100).unwrap();
        assert_eq!(
            derived,
            unhex(
                "683f839a1cf9cfd2e2f9ca2ca2e1d0c952fc8ff8719f45edf3130d987d2b4c17\
                 ad1fad1782b452c4beb1c2fd6cecffffd2dd8023d2a436162d797fb5d3ba74bc\
                 c107a579ddf7e6adb88b33432bfa024d6918dfe7a39d8efaf1442335df12ac03\
                 b8e15e5c"
            )
        );

        let derived = kdf2::<Sha384>(&secret, 48).unwrap();
        assert_eq!(
            derived,
            unhex(
                "151a4f15dd7a3fbccc5bf8c45f5f38e6893f8784d40cae725a7d99efab13ed0e\
                 0526eb63c8f323e5b48267d270e1cfe5"
            )
        );
    }

    #[test]
    fn empty_secret() {
        let derived = kdf2::<Sha256>(&[], 20).unwrap();
        assert_eq!(derived, unhex("b40711a88c7039756fb8a73827eabe2c0fe5a034"));
    }

    #[test]
    fn zero_length_output() {
        assert!(kdf2::<Sha256>(b"secret", 0).unwrap().is_empty());
    }

    #[test]
    fn shorter_output_is_prefix_of_longer() {
        let long = kdf2::<Sha256>(b"prefix property", 70).unwrap();
        let short = kdf2::<Sha256>(b"prefix property", 33).unwrap();

        assert_eq!(&long[..33], short.as_slice());
    }
}
