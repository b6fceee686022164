//! Error types for custody-keys

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid key length: {actual} bytes")]
    InvalidKeyLength { actual: usize },

    #[error("Unsupported key format: {0}")]
    UnsupportedKeyFormat(String),

    #[error("Unsupported signature format: {0}")]
    UnsupportedSignatureFormat(String),

    #[error("Curve arithmetic failed: {0}")]
    CurveArithmeticError(String),

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

pub type Result<T> = std::result::Result<T, KeyError>;
