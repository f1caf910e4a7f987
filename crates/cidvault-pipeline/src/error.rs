use cidvault_crypto::CryptoError;
use cidvault_registry::RegistryError;
use cidvault_store::{MirrorFailure, StoreError};
use cidvault_types::{ChainId, Cid, TxHash};

use crate::config::ConfigError;

/// What the user should take away from a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// The user declined a prompt.
    UserRejected,
    /// A wallet, network, store, or ledger could not serve the request.
    NetworkOrService,
    /// The stored data could not be used.
    InvalidData,
    /// The installation is not configured.
    Configuration,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::UserRejected => "you rejected an action",
            Self::NetworkOrService => "the network or a service failed",
            Self::InvalidData => "the data was invalid",
            Self::Configuration => "the configuration is incomplete",
        };
        f.write_str(label)
    }
}

/// Terminal failure of a publish or retrieve session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("identity provider unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("wrong network: expected chain {expected}, wallet is on {actual}")]
    WrongNetwork { expected: ChainId, actual: ChainId },

    #[error("blob store unavailable at {endpoint}: {detail}")]
    StoreUnavailable { endpoint: String, detail: String },

    #[error("{cid} not found on any mirror ({})", describe_attempts(.attempts))]
    BlobNotFound {
        cid: Cid,
        attempts: Vec<MirrorFailure>,
    },

    #[error("registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("registration reverted in {tx_hash}: {reason}")]
    RegistrationReverted { tx_hash: TxHash, reason: String },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("decryption denied")]
    DecryptionDenied,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
}

fn describe_attempts(attempts: &[MirrorFailure]) -> String {
    if attempts.is_empty() {
        return "no mirrors configured".into();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::RegistrationRejected(_) | Self::DecryptionDenied => FailureCategory::UserRejected,
            Self::IdentityUnavailable(_)
            | Self::WrongNetwork { .. }
            | Self::StoreUnavailable { .. }
            | Self::BlobNotFound { .. }
            | Self::RegistrationReverted { .. }
            | Self::LedgerUnavailable(_) => FailureCategory::NetworkOrService,
            Self::DecryptionFailed(_) => FailureCategory::InvalidData,
            Self::ConfigurationMissing(_) => FailureCategory::Configuration,
        }
    }

    /// Human-readable next step for the user.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::RegistrationRejected(_) => "Approve the registration in your wallet to publish.",
            Self::DecryptionDenied => {
                "Approve the decryption request in your wallet to open the file."
            }
            Self::IdentityUnavailable(_) => "Connect or unlock your wallet, then retry.",
            Self::WrongNetwork { .. } => "Switch your wallet to the expected network, then retry.",
            Self::StoreUnavailable { .. } => {
                "The pinning service refused the upload; check credentials and retry."
            }
            Self::BlobNotFound { .. } => "No gateway served the file; retry later or add a mirror.",
            Self::RegistrationReverted { .. } => {
                "The ledger rejected the registration; retry the upload."
            }
            Self::LedgerUnavailable(_) => "The ledger could not be queried; retry later.",
            Self::DecryptionFailed(_) => {
                "The stored file is corrupt or sealed to another key; re-upload it."
            }
            Self::ConfigurationMissing(_) => "Set the missing configuration value and restart.",
        }
    }
}

impl From<CryptoError> for PipelineError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::IdentityUnavailable(msg) => Self::IdentityUnavailable(msg),
            CryptoError::WrongNetwork { expected, actual } => {
                Self::WrongNetwork { expected, actual }
            }
            CryptoError::DecryptionDenied => Self::DecryptionDenied,
            CryptoError::DecryptionFailed(msg) => Self::DecryptionFailed(msg),
            // Sealing only fails on an unusable public key from the provider.
            CryptoError::EncryptionFailed(msg) => {
                Self::IdentityUnavailable(format!("unusable encryption key: {msg}"))
            }
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StoreUnavailable { endpoint, status, body } => Self::StoreUnavailable {
                endpoint,
                detail: match status {
                    Some(code) => format!("HTTP {code}: {body}"),
                    None => body,
                },
            },
            StoreError::BlobNotFound { cid, attempts } => Self::BlobNotFound { cid, attempts },
            StoreError::InvalidResponse { endpoint, reason } => Self::StoreUnavailable {
                endpoint,
                detail: reason,
            },
        }
    }
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::RegistrationRejected(msg) => Self::RegistrationRejected(msg),
            RegistryError::RegistrationReverted { tx_hash, reason } => {
                Self::RegistrationReverted { tx_hash, reason }
            }
            RegistryError::NetworkMismatch { expected, actual } => {
                Self::WrongNetwork { expected, actual }
            }
            RegistryError::IdentityUnavailable(msg) => Self::IdentityUnavailable(msg),
            RegistryError::Ledger(msg)
            | RegistryError::InvalidEvent(msg)
            | RegistryError::Metadata(msg) => Self::LedgerUnavailable(msg),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigurationMissing(err.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
