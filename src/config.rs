//! Codec configuration.
//!
//! Legacy integrations disagree on how private keys and signatures are framed.
//! [`CodecConfig`] pins down the marker bytes and the signature frame handling
//! used by [`FormatCodec`](crate::codec::FormatCodec).

use crate::error::{KeyError, Result};

/// Smallest BIP32 seed, in bytes (128 bits).
pub const MIN_SEED_LEN: usize = 16;
/// Largest BIP32 seed, in bytes (512 bits).
pub const MAX_SEED_LEN: usize = 64;

/// How the legacy framed signature encoding is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureFrame {
    /// Walk the frame (`0x30 len 0x02 rlen r 0x02 slen s`) and extract both
    /// integers, accepting leading zero padding and short integers.
    #[default]
    Der,
    /// Take r from bytes 4..36 and s from the final 32 bytes. Only the
    /// canonical 70-byte frame is accepted.
    FixedOffsets,
}

/// Marker bytes and framing rules for key and signature normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Leading byte of a 33/34-byte private key (WIF version byte).
    pub network_marker: u8,
    /// Trailing byte of a 33/34-byte private key (compressed-pubkey flag).
    pub compression_flag: u8,
    /// Signature frame decoding mode.
    pub signature_frame: SignatureFrame,
    /// Minimum entropy accepted for master key derivation, in bytes.
    pub min_entropy_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            network_marker: 0x80,
            compression_flag: 0x01,
            signature_frame: SignatureFrame::Der,
            min_entropy_len: MIN_SEED_LEN,
        }
    }
}

impl CodecConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_network_marker(mut self, marker: u8) -> Self {
        self.network_marker = marker;
        self
    }

    #[must_use]
    pub fn with_compression_flag(mut self, flag: u8) -> Self {
        self.compression_flag = flag;
        self
    }

    #[must_use]
    pub fn with_signature_frame(mut self, frame: SignatureFrame) -> Self {
        self.signature_frame = frame;
        self
    }

    #[must_use]
    pub fn with_min_entropy_len(mut self, len: usize) -> Self {
        self.min_entropy_len = len;
        self
    }

    /// Check the configuration and return it.
    ///
    /// # Errors
    /// Returns `KeyError::InvalidInput` if the entropy bound lies outside the
    /// BIP32 seed range.
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    /// Returns `KeyError::InvalidInput` if the entropy bound lies outside the
    /// BIP32 seed range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&self.min_entropy_len) {
            return Err(KeyError::InvalidInput(format!(
                "min_entropy_len must be within {}..={} bytes, got {}",
                MIN_SEED_LEN, MAX_SEED_LEN, self.min_entropy_len
            )));
        }
        Ok(())
    }
}
