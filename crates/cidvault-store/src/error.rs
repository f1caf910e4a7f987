use cidvault_types::Cid;

/// Why a single mirror could not serve a CID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found")]
    NotFound,
}

/// One failed mirror attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorFailure {
    pub endpoint: String,
    pub error: GatewayError,
}

impl std::fmt::Display for MirrorFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.endpoint, self.error)
    }
}

/// Errors from blob store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The pinning endpoint refused or could not be reached.
    #[error("store unavailable at {endpoint}: {}", describe_status(.status, .body))]
    StoreUnavailable {
        endpoint: String,
        status: Option<u16>,
        body: String,
    },

    /// Every configured mirror failed.
    #[error("blob {cid} not found on any of {} mirror(s)", .attempts.len())]
    BlobNotFound {
        cid: Cid,
        attempts: Vec<MirrorFailure>,
    },

    /// The pinning endpoint answered success with an unusable body.
    #[error("invalid store response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

fn describe_status(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("HTTP {code}: {body}"),
        None => body.to_string(),
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
