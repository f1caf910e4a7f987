use thiserror::Error;

/// Errors produced by type parsing and codec operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("invalid content identifier: {0:?}")]
    InvalidCid(String),

    #[error("invalid chain id: {0:?}")]
    InvalidChainId(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
