use std::sync::Arc;

use bytes::Bytes;
use cidvault_types::Cid;
use tracing::{debug, info, warn};

use crate::error::{MirrorFailure, StoreError, StoreResult};
use crate::traits::Gateway;

/// Ordered list of read endpoints.
///
/// `fetch` tries each mirror in configuration order and returns the first
/// success; mirrors after the winner are never contacted. This trades
/// worst-case latency for resilience against a single mirror outage. It is
/// not a load balancer.
#[derive(Clone, Default)]
pub struct MirrorSet {
    gateways: Vec<Arc<dyn Gateway>>,
}

impl MirrorSet {
    pub fn new(gateways: Vec<Arc<dyn Gateway>>) -> Self {
        Self { gateways }
    }

    /// Append a mirror at the lowest priority.
    pub fn push(&mut self, gateway: Arc<dyn Gateway>) {
        self.gateways.push(gateway);
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    /// Endpoints in fetch order.
    pub fn endpoints(&self) -> Vec<String> {
        self.gateways.iter().map(|g| g.endpoint().to_string()).collect()
    }

    /// Fetch `cid`, falling back through mirrors in order.
    ///
    /// Fails with [`StoreError::BlobNotFound`] only once every mirror has
    /// failed; the error lists each attempt.
    pub async fn fetch(&self, cid: &Cid) -> StoreResult<Bytes> {
        let mut attempts = Vec::with_capacity(self.gateways.len());

        for (index, gateway) in self.gateways.iter().enumerate() {
            debug!(%cid, mirror = index, endpoint = gateway.endpoint(), "trying mirror");
            match gateway.get(cid).await {
                Ok(bytes) => {
                    info!(
                        %cid,
                        mirror = index,
                        endpoint = gateway.endpoint(),
                        len = bytes.len(),
                        "fetched blob"
                    );
                    return Ok(bytes);
                }
                Err(error) => {
                    warn!(%cid, endpoint = gateway.endpoint(), %error, "mirror failed");
                    attempts.push(MirrorFailure {
                        endpoint: gateway.endpoint().to_string(),
                        error,
                    });
                }
            }
        }

        Err(StoreError::BlobNotFound {
            cid: cid.clone(),
            attempts,
        })
    }
}

impl std::fmt::Debug for MirrorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorSet")
            .field("endpoints", &self.endpoints())
            .finish()
    }
}
