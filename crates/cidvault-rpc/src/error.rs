use thiserror::Error;

use crate::message::codes;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The endpoint could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP {status} from RPC endpoint: {body}")]
    Http { status: u16, body: String },

    /// The provider answered with a JSON-RPC error object.
    #[error("provider error {code}: {message}")]
    Provider { code: i64, message: String },

    /// The response could not be decoded.
    #[error("malformed RPC response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Returns `true` if the user declined the request in their wallet.
    pub fn is_user_rejected(&self) -> bool {
        matches!(self, Self::Provider { code, .. } if *code == codes::USER_REJECTED)
    }

    /// Returns `true` if the provider refused for lack of an account or method.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Provider { code, .. }
                if *code == codes::UNAUTHORIZED
                    || *code == codes::UNSUPPORTED_METHOD
                    || *code == codes::DISCONNECTED
                    || *code == codes::CHAIN_DISCONNECTED
        ) || matches!(self, Self::Transport(_))
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
