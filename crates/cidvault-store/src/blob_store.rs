use std::sync::Arc;

use bytes::Bytes;
use cidvault_types::Cid;
use tracing::{info, instrument};

use crate::error::StoreResult;
use crate::mirror::MirrorSet;
use crate::traits::Pinner;

/// Write-to-one, read-from-many facade over the blob store.
#[derive(Clone)]
pub struct BlobStore {
    pinner: Arc<dyn Pinner>,
    mirrors: MirrorSet,
}

impl BlobStore {
    pub fn new(pinner: Arc<dyn Pinner>, mirrors: MirrorSet) -> Self {
        Self { pinner, mirrors }
    }

    /// Pin `payload` on the authoritative endpoint. One attempt, no retry.
    #[instrument(
        skip(self, payload),
        fields(len = payload.len(), endpoint = self.pinner.endpoint())
    )]
    pub async fn pin(&self, payload: Bytes, name_hint: Option<&str>) -> StoreResult<Cid> {
        let cid = self.pinner.pin(payload, name_hint).await?;
        info!(%cid, "pinned payload");
        Ok(cid)
    }

    /// Fetch `cid` through the mirrors in order.
    pub async fn fetch(&self, cid: &Cid) -> StoreResult<Bytes> {
        self.mirrors.fetch(cid).await
    }

    pub fn mirrors(&self) -> &MirrorSet {
        &self.mirrors
    }

    pub fn pin_endpoint(&self) -> &str {
        self.pinner.endpoint()
    }
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("pin_endpoint", &self.pinner.endpoint())
            .field("mirrors", &self.mirrors)
            .finish()
    }
}
