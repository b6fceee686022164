//! Custody Keys
//!
//! secp256k1 key material for custody services:
//! - BIP32 master key derivation from entropy
//! - Compressed / uncompressed public key conversion
//! - Normalization of legacy private key and signature layouts
//! - Message signing and verification
//!
//! # Example
//!
//! ```rust
//! use custody_keys::{KeyMaterial, KeySource, verify_message};
//!
//! let entropy = b"3123213213213123312c3kjifj3".to_vec();
//! let keys = KeyMaterial::new(KeySource::FromEntropy(entropy)).unwrap();
//! let signature = keys.sign(b"hello world").unwrap();
//! assert!(verify_message(b"hello world", &signature, &keys.public_key()).unwrap());
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod signer;

pub use codec::{
    compressed_from_uncompressed, to_compressed_public_key, to_uncompressed_public_key,
    uncompressed_from_compressed, FormatCodec,
};
pub use config::{CodecConfig, SignatureFrame};
pub use error::*;
pub use keys::{KeyMaterial, KeySource};
pub use signer::{sign_message, verify_message, Signer};
