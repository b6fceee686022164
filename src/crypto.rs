//! Cryptographic primitives for custody-keys
//!
//! Thin wrappers over the trusted primitives:
//! - SHA-256 message digests
//! - BIP32 master key derivation from entropy
//! - Generator multiplication (private scalar to public point)

use hmac::{Hmac, Mac};
use k256::ecdsa::SigningKey;
use k256::FieldBytes;
use sha2::{Digest, Sha256, Sha512};
use tracing::instrument;
use zeroize::Zeroize;

use crate::config::{MAX_SEED_LEN, MIN_SEED_LEN};
use crate::error::{KeyError, Result};

/// HMAC key for BIP32 master key generation.
const MASTER_KEY_DOMAIN: &[u8] = b"Bitcoin seed";

/// A BIP32 master key: the left and right halves of
/// `HMAC-SHA512("Bitcoin seed", entropy)`.
pub struct MasterKey {
    /// Private scalar (32 bytes, big-endian)
    pub private_key: [u8; 32],
    /// Chain code for child derivation (32 bytes)
    pub chain_code: [u8; 32],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
        self.chain_code.zeroize();
    }
}

/// Derive the BIP32 master key pair from entropy.
///
/// # Errors
/// `InvalidInput` for entropy outside 16..=64 bytes, `CurveArithmeticError`
/// if the left half is not a valid scalar (zero or not below the curve order).
#[instrument(level = "debug", skip(entropy), fields(entropy_len = entropy.len()))]
pub fn derive_master_key(entropy: &[u8]) -> Result<MasterKey> {
    if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&entropy.len()) {
        return Err(KeyError::InvalidInput(format!(
            "entropy must be {}..={} bytes, got {}",
            MIN_SEED_LEN,
            MAX_SEED_LEN,
            entropy.len()
        )));
    }

    let mut mac = Hmac::<Sha512>::new_from_slice(MASTER_KEY_DOMAIN)
        .map_err(|e| KeyError::InvalidInput(e.to_string()))?;
    mac.update(entropy);
    let digest = mac.finalize().into_bytes();

    let mut master = MasterKey {
        private_key: [0u8; 32],
        chain_code: [0u8; 32],
    };
    master.private_key.copy_from_slice(&digest[..32]);
    master.chain_code.copy_from_slice(&digest[32..]);

    // Validates 0 < k < n
    signing_key(&master.private_key)?;

    Ok(master)
}

/// Build a signing key from a normalized 32-byte private scalar.
pub fn signing_key(private_key: &[u8; 32]) -> Result<SigningKey> {
    SigningKey::from_bytes(FieldBytes::from_slice(private_key))
        .map_err(|e| KeyError::CurveArithmeticError(format!("private scalar out of range: {}", e)))
}

/// Multiply the generator by a private scalar.
///
/// # Returns
/// The uncompressed SEC1 encoding of the public point (65 bytes, `0x04 || x || y`)
pub fn public_key_from_scalar(private_key: &[u8; 32]) -> Result<[u8; 65]> {
    let signing_key = signing_key(private_key)?;
    let point = signing_key.verifying_key().to_encoded_point(false);

    let mut out = [0u8; 65];
    out.copy_from_slice(point.as_bytes());
    Ok(out)
}

/// Compute SHA256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
