use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use cidvault_types::Cid;

use crate::error::{GatewayError, StoreError, StoreResult};
use crate::traits::{Gateway, Pinner};

const MEMORY_ENDPOINT: &str = "memory://pin";

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Payloads are held behind a `RwLock`
/// and addressed by [`Cid::derive`], so pinning the same bytes twice yields
/// the same CID and stores one copy. Failure toggles let callers simulate an
/// outage on either side.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<Cid, Bytes>>,
    names: RwLock<HashMap<Cid, String>>,
    fail_pins: AtomicBool,
    pin_calls: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            fail_pins: AtomicBool::new(false),
            pin_calls: AtomicUsize::new(0),
        }
    }

    /// Number of distinct payloads stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.blobs.read().expect("lock poisoned").contains_key(cid)
    }

    /// Raw stored bytes, bypassing any gateway.
    pub fn get(&self, cid: &Cid) -> Option<Bytes> {
        self.blobs.read().expect("lock poisoned").get(cid).cloned()
    }

    /// Name hint recorded when `cid` was pinned, if any.
    pub fn name_of(&self, cid: &Cid) -> Option<String> {
        self.names.read().expect("lock poisoned").get(cid).cloned()
    }

    /// Store `payload` under an explicit CID, as a foreign writer would.
    pub fn insert(&self, cid: Cid, payload: impl Into<Bytes>) {
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(cid, payload.into());
    }

    /// Make every subsequent `pin` fail with `StoreUnavailable`.
    pub fn set_fail_pins(&self, fail: bool) {
        self.fail_pins.store(fail, Ordering::SeqCst);
    }

    /// Number of `pin` calls received, including failed ones.
    pub fn pin_calls(&self) -> usize {
        self.pin_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pinner for InMemoryBlobStore {
    fn endpoint(&self) -> &str {
        MEMORY_ENDPOINT
    }

    async fn pin(&self, payload: Bytes, name_hint: Option<&str>) -> StoreResult<Cid> {
        self.pin_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pins.load(Ordering::SeqCst) {
            return Err(StoreError::StoreUnavailable {
                endpoint: MEMORY_ENDPOINT.into(),
                status: Some(503),
                body: "pinning disabled".into(),
            });
        }

        let cid = Cid::derive(&payload);
        self.blobs
            .write()
            .expect("lock poisoned")
            .entry(cid.clone())
            .or_insert(payload);
        if let Some(name) = name_hint {
            self.names
                .write()
                .expect("lock poisoned")
                .insert(cid.clone(), name.to_string());
        }
        Ok(cid)
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

/// Read endpoint serving from an [`InMemoryBlobStore`].
///
/// Several gateways may share one store; each can be taken offline on its own
/// to exercise mirror fallback.
pub struct MemoryGateway {
    name: String,
    store: Arc<InMemoryBlobStore>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryGateway {
    pub fn new(name: impl Into<String>, store: Arc<InMemoryBlobStore>) -> Self {
        Self {
            name: name.into(),
            store,
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// While offline every request answers HTTP 503.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn get(&self, cid: &Cid) -> Result<Bytes, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Status { status: 503 });
        }
        self.store.get(cid).ok_or(GatewayError::NotFound)
    }
}

impl std::fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGateway")
            .field("name", &self.name)
            .field("offline", &self.offline.load(Ordering::SeqCst))
            .finish()
    }
}
