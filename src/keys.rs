//! Key material: a secp256k1 key pair with both public key encodings cached.

use std::fmt;

use tracing::instrument;
use zeroize::Zeroize;

use crate::codec::{
    compressed_from_uncompressed, decode_hex, FormatCodec, COMPRESSED_LEN, PRIVATE_KEY_LEN,
    UNCOMPRESSED_LEN,
};
use crate::crypto::{derive_master_key, public_key_from_scalar};
use crate::error::{KeyError, Result};
use crate::signer::Signer;

/// Where a key pair comes from.
#[derive(Clone)]
pub enum KeySource {
    /// Seed bytes for BIP32 master key derivation
    FromEntropy(Vec<u8>),
    /// Private key bytes in any layout accepted by
    /// [`FormatCodec::normalize_private_key`]
    FromPrivateKey(Vec<u8>),
}

impl KeySource {
    /// Pick a source from optional request fields.
    ///
    /// Entropy is used verbatim as UTF-8 bytes; the private key is hex.
    /// Entropy wins when both are present. Empty strings count as absent.
    ///
    /// # Errors
    /// `InvalidInput` when neither field is present, `InvalidHex` for a
    /// private key that is not hex.
    pub fn from_fields(entropy: Option<&str>, private_key: Option<&str>) -> Result<Self> {
        match (
            entropy.filter(|e| !e.is_empty()),
            private_key.filter(|k| !k.is_empty()),
        ) {
            (Some(entropy), _) => Ok(Self::FromEntropy(entropy.as_bytes().to_vec())),
            (None, Some(private_key)) => Ok(Self::FromPrivateKey(decode_hex(private_key)?)),
            (None, None) => Err(KeyError::InvalidInput(
                "either entropy or private_key is required".to_string(),
            )),
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromEntropy(bytes) => write!(f, "FromEntropy({} bytes)", bytes.len()),
            Self::FromPrivateKey(bytes) => write!(f, "FromPrivateKey({} bytes)", bytes.len()),
        }
    }
}

impl Drop for KeySource {
    fn drop(&mut self) {
        match self {
            Self::FromEntropy(bytes) | Self::FromPrivateKey(bytes) => bytes.zeroize(),
        }
    }
}

/// A secp256k1 key pair.
///
/// Immutable once built. The private scalar (and chain code, for keys built
/// from entropy) is wiped on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    private_key: [u8; PRIVATE_KEY_LEN],
    chain_code: Option<[u8; 32]>,
    public_key: [u8; COMPRESSED_LEN],
    uncompressed_public_key: [u8; UNCOMPRESSED_LEN],
}

impl KeyMaterial {
    /// Build key material with the default codec.
    pub fn new(source: KeySource) -> Result<Self> {
        Self::with_codec(source, &FormatCodec::default())
    }

    /// Build key material, normalizing private keys and bounding entropy
    /// through `codec`.
    #[instrument(level = "debug", skip(codec))]
    pub fn with_codec(source: KeySource, codec: &FormatCodec) -> Result<Self> {
        match &source {
            KeySource::FromEntropy(entropy) => {
                let min = codec.config().min_entropy_len;
                if entropy.len() < min {
                    return Err(KeyError::InvalidInput(format!(
                        "entropy must be at least {} bytes, got {}",
                        min,
                        entropy.len()
                    )));
                }
                Self::from_entropy(entropy)
            }
            KeySource::FromPrivateKey(bytes) => {
                let mut scalar = codec.normalize_private_key(bytes)?;
                let key = Self::from_scalar(&scalar, None);
                scalar.zeroize();
                key
            }
        }
    }

    /// Derive the BIP32 master key pair from entropy.
    ///
    /// Entropy must be 16..=64 bytes; [`KeyMaterial::with_codec`] may raise
    /// the lower bound through its configuration.
    pub fn from_entropy(entropy: &[u8]) -> Result<Self> {
        let master = derive_master_key(entropy)?;
        Self::from_scalar(&master.private_key, Some(master.chain_code))
    }

    /// Build key material from a hex private key in any legacy layout
    /// (0x prefix optional).
    pub fn from_private_key(private_key_hex: &str) -> Result<Self> {
        Self::new(KeySource::FromPrivateKey(decode_hex(private_key_hex)?))
    }

    fn from_scalar(scalar: &[u8; PRIVATE_KEY_LEN], chain_code: Option<[u8; 32]>) -> Result<Self> {
        let uncompressed_public_key = public_key_from_scalar(scalar)?;
        let public_key = compressed_from_uncompressed(&uncompressed_public_key)?;

        Ok(Self {
            private_key: *scalar,
            chain_code,
            public_key,
            uncompressed_public_key,
        })
    }

    /// Private key (32 bytes, hex)
    pub fn private_key(&self) -> String {
        hex::encode(self.private_key)
    }

    /// Compressed public key (33 bytes, hex)
    pub fn public_key(&self) -> String {
        hex::encode(self.public_key)
    }

    /// Uncompressed public key (65 bytes, hex)
    pub fn uncompressed_public_key(&self) -> String {
        hex::encode(self.uncompressed_public_key)
    }

    /// BIP32 chain code (hex), present only for keys derived from entropy
    pub fn chain_code(&self) -> Option<String> {
        self.chain_code.map(hex::encode)
    }

    /// Compressed public key bytes
    pub fn public_key_bytes(&self) -> &[u8; COMPRESSED_LEN] {
        &self.public_key
    }

    /// Uncompressed public key bytes (`0x04 || x || y`)
    pub fn uncompressed_public_key_bytes(&self) -> &[u8; UNCOMPRESSED_LEN] {
        &self.uncompressed_public_key
    }

    /// Sign `message` with this key pair's private key.
    pub fn sign(&self, message: &[u8]) -> Result<String> {
        Signer::default().sign_bytes(message, &self.private_key)
    }

    /// Verify `signature_hex` over `message` against this key pair's public key.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> Result<bool> {
        Signer::default().verify_bytes(
            message,
            &decode_hex(signature_hex)?,
            &self.uncompressed_public_key,
        )
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.private_key == other.private_key && self.chain_code == other.chain_code
    }
}

impl Eq for KeyMaterial {}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.private_key.zeroize();
        if let Some(chain_code) = self.chain_code.as_mut() {
            chain_code.zeroize();
        }
    }
}
