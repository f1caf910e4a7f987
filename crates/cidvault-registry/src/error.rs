use cidvault_crypto::CryptoError;
use cidvault_rpc::RpcError;
use cidvault_types::{ChainId, TxHash};

/// Errors produced by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("registration rejected by signer: {0}")]
    RegistrationRejected(String),

    #[error("registration reverted in {tx_hash}: {reason}")]
    RegistrationReverted { tx_hash: TxHash, reason: String },

    #[error("network mismatch: expected chain {expected}, connected to {actual}")]
    NetworkMismatch { expected: ChainId, actual: ChainId },

    #[error("identity provider unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("ledger request failed: {0}")]
    Ledger(String),

    #[error("malformed registry event: {0}")]
    InvalidEvent(String),

    #[error("metadata lookup failed: {0}")]
    Metadata(String),
}

impl RegistryError {
    /// Map an RPC failure raised while submitting a registration.
    pub fn from_submit(err: RpcError) -> Self {
        if err.is_user_rejected() {
            Self::RegistrationRejected(err.to_string())
        } else if err.is_unavailable() {
            Self::IdentityUnavailable(err.to_string())
        } else {
            Self::Ledger(err.to_string())
        }
    }
}

impl From<CryptoError> for RegistryError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::WrongNetwork { expected, actual } => {
                Self::NetworkMismatch { expected, actual }
            }
            other => Self::IdentityUnavailable(other.to_string()),
        }
    }
}

impl From<RpcError> for RegistryError {
    fn from(err: RpcError) -> Self {
        Self::Ledger(err.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cidvault_rpc::codes;

    #[test]
    fn user_rejection_on_submit() {
        let err = RegistryError::from_submit(RpcError::Provider {
            code: codes::USER_REJECTED,
            message: "User denied transaction signature".into(),
        });
        assert!(matches!(err, RegistryError::RegistrationRejected(_)));
    }

    #[test]
    fn disconnected_wallet_on_submit() {
        let err = RegistryError::from_submit(RpcError::Transport("refused".into()));
        assert!(matches!(err, RegistryError::IdentityUnavailable(_)));
    }

    #[test]
    fn guard_failure_becomes_network_mismatch() {
        let err: RegistryError = CryptoError::WrongNetwork {
            expected: ChainId::SEPOLIA,
            actual: ChainId::MAINNET,
        }
        .into();
        assert_eq!(
            err,
            RegistryError::NetworkMismatch {
                expected: ChainId::SEPOLIA,
                actual: ChainId::MAINNET
            }
        );
    }
}
