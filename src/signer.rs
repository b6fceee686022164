//! Message signing and verification.
//!
//! Messages are hashed with SHA-256 and signed with deterministic (RFC 6979)
//! ECDSA over secp256k1. Signatures are emitted as raw `r || s` hex.
//!
//! Verification separates two failure channels:
//! - malformed input (bad hex, unsupported length or frame, a point off the
//!   curve) is an error
//! - a well-formed signature that does not verify is `Ok(false)`

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, VerifyingKey};
use tracing::{debug, instrument};
use zeroize::Zeroize;

use crate::codec::{decode_hex, FormatCodec, UNCOMPRESSED_LEN};
use crate::crypto::{sha256, signing_key};
use crate::error::{KeyError, Result};

/// Signs and verifies messages, normalizing legacy key and signature
/// layouts through its [`FormatCodec`].
#[derive(Debug, Clone, Default)]
pub struct Signer {
    codec: FormatCodec,
}

impl Signer {
    pub fn new(codec: FormatCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &FormatCodec {
        &self.codec
    }

    /// Sign a message.
    ///
    /// # Arguments
    /// * `message` - Message bytes; hashed with SHA-256 before signing
    /// * `private_key_hex` - Private key in hex, 32/33/34-byte layouts accepted
    ///
    /// # Returns
    /// Signature hex (64 bytes, r || s, low-s)
    pub fn sign(&self, message: &[u8], private_key_hex: &str) -> Result<String> {
        let mut private_key = decode_hex(private_key_hex)?;
        let signature = self.sign_bytes(message, &private_key);
        private_key.zeroize();
        signature
    }

    /// Sign a message with raw private key bytes.
    #[instrument(
        level = "debug",
        skip(self, message, private_key),
        fields(message_len = message.len())
    )]
    pub fn sign_bytes(&self, message: &[u8], private_key: &[u8]) -> Result<String> {
        let mut scalar = self.codec.normalize_private_key(private_key)?;
        let signing_key = signing_key(&scalar);
        scalar.zeroize();
        let signing_key = signing_key?;

        // Sign the digest directly to avoid hashing twice
        let digest = sha256(message);
        let signature: Signature = signing_key
            .sign_prehash(&digest)
            .map_err(|e| KeyError::SigningFailed(e.to_string()))?;

        Ok(hex::encode(signature.to_bytes()))
    }

    /// Verify a signature over a message.
    ///
    /// # Arguments
    /// * `message` - Message bytes that were signed
    /// * `signature_hex` - Raw `r || s` or legacy framed signature, in hex
    /// * `public_key_hex` - Compressed, uncompressed or raw public key, in hex
    ///
    /// # Returns
    /// `Ok(true)` if the signature is valid, `Ok(false)` if it is well formed
    /// but does not verify
    pub fn verify(
        &self,
        message: &[u8],
        signature_hex: &str,
        public_key_hex: &str,
    ) -> Result<bool> {
        let signature = decode_hex(signature_hex)?;
        let public_key = decode_hex(public_key_hex)?;
        self.verify_bytes(message, &signature, &public_key)
    }

    /// Verify with raw signature and public key bytes.
    #[instrument(
        level = "debug",
        skip(self, message, signature, public_key),
        fields(
            message_len = message.len(),
            signature_len = signature.len(),
            public_key_len = public_key.len()
        )
    )]
    pub fn verify_bytes(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool> {
        let raw_signature = self.codec.normalize_signature(signature)?;
        let raw_point = self.codec.normalize_public_key(public_key)?;

        let mut sec1 = [0u8; UNCOMPRESSED_LEN];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(&raw_point);
        let verifying_key = VerifyingKey::from_sec1_bytes(&sec1)
            .map_err(|_| KeyError::CurveArithmeticError("point is not on secp256k1".to_string()))?;

        // r or s outside 1..n: well formed, but no valid signature looks like this
        let signature = match Signature::from_slice(&raw_signature) {
            Ok(signature) => signature,
            Err(_) => {
                debug!("signature scalar out of range");
                return Ok(false);
            }
        };
        // Legacy signers did not normalize s
        let signature = signature.normalize_s().unwrap_or(signature);

        let digest = sha256(message);
        match verifying_key.verify_prehash(&digest, &signature) {
            Ok(()) => Ok(true),
            Err(_) => {
                debug!("signature does not verify");
                Ok(false)
            }
        }
    }
}

/// Sign with the default codec. See [`Signer::sign`].
pub fn sign_message(message: &[u8], private_key_hex: &str) -> Result<String> {
    Signer::default().sign(message, private_key_hex)
}

/// Verify with the default codec. See [`Signer::verify`].
pub fn verify_message(
    message: &[u8],
    signature_hex: &str,
    public_key_hex: &str,
) -> Result<bool> {
    Signer::default().verify(message, signature_hex, public_key_hex)
}
