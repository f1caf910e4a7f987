use cidvault_types::ChainId;

/// Failures reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// No provider is reachable, or it has no usable account or key.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The user declined the request.
    #[error("request rejected by user: {0}")]
    Rejected(String),

    /// The provider attempted the request and failed.
    #[error("identity provider failed: {0}")]
    Failed(String),
}

/// Errors from encryption, decryption, and network checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("identity unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("wrong network: expected chain {expected}, connected to {actual}")]
    WrongNetwork { expected: ChainId, actual: ChainId },

    #[error("decryption denied by user")]
    DecryptionDenied,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

impl CryptoError {
    /// Map a provider failure raised while decrypting.
    pub fn from_decrypt(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => Self::IdentityUnavailable(msg),
            ProviderError::Rejected(_) => Self::DecryptionDenied,
            ProviderError::Failed(msg) => Self::DecryptionFailed(msg),
        }
    }

    /// Map a provider failure raised while reading identity state.
    pub fn from_identity(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) | ProviderError::Failed(msg) => {
                Self::IdentityUnavailable(msg)
            }
            ProviderError::Rejected(msg) => Self::IdentityUnavailable(format!("rejected: {msg}")),
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
