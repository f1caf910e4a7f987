use async_trait::async_trait;
use bytes::Bytes;
use cidvault_types::Cid;

use crate::error::{GatewayError, StoreResult};

/// The authoritative write endpoint of the blob store.
///
/// Implementations must satisfy:
/// - One attempt per call; no internal retry.
/// - The returned CID is derived from the payload by the store.
/// - Any non-success response is [`crate::StoreError::StoreUnavailable`],
///   carrying the endpoint's status and body.
#[async_trait]
pub trait Pinner: Send + Sync {
    /// Human-readable endpoint identity for logs and errors.
    fn endpoint(&self) -> &str;

    /// Store `payload` and return its content identifier.
    async fn pin(&self, payload: Bytes, name_hint: Option<&str>) -> StoreResult<Cid>;
}

/// A single read endpoint serving content-addressed payloads.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn endpoint(&self) -> &str;

    /// Fetch the payload for `cid`. Only a success status yields bytes.
    async fn get(&self, cid: &Cid) -> Result<Bytes, GatewayError>;
}
