use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use cidvault_types::Cid;
use serde::Deserialize;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::traits::MetadataLookup;

#[derive(Deserialize)]
struct PinList {
    #[serde(default)]
    rows: Vec<PinRow>,
}

#[derive(Deserialize)]
struct PinRow {
    #[serde(default)]
    metadata: Option<PinMetadata>,
}

#[derive(Deserialize)]
struct PinMetadata {
    #[serde(default)]
    name: Option<String>,
}

/// Friendly-name lookup against a Pinata-style `pinList` endpoint.
#[derive(Clone)]
pub struct PinataMetadata {
    endpoint: String,
    jwt: String,
    http: reqwest::Client,
}

impl PinataMetadata {
    pub fn new(endpoint: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            jwt: jwt.into(),
            http: reqwest::Client::new(),
        }
    }
}

impl std::fmt::Debug for PinataMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataMetadata")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataLookup for PinataMetadata {
    async fn lookup_name(&self, cid: &Cid) -> RegistryResult<Option<String>> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("hashContains", cid.as_str())])
            .bearer_auth(&self.jwt)
            .send()
            .await
            .map_err(|e| RegistryError::Metadata(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Metadata(format!("HTTP {}", status.as_u16())));
        }
        let list: PinList = response
            .json()
            .await
            .map_err(|e| RegistryError::Metadata(e.to_string()))?;

        let name = list
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.metadata)
            .and_then(|meta| meta.name)
            .filter(|name| !name.trim().is_empty());
        debug!(%cid, ?name, "metadata lookup");
        Ok(name)
    }
}

/// Lookup used when no metadata service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMetadata;

#[async_trait]
impl MetadataLookup for NoMetadata {
    async fn lookup_name(&self, _cid: &Cid) -> RegistryResult<Option<String>> {
        Ok(None)
    }
}

/// Fixed name table, with per-CID failure injection.
#[derive(Default)]
pub struct StaticMetadata {
    names: RwLock<HashMap<Cid, String>>,
    failing: RwLock<HashSet<Cid>>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cid: Cid, name: impl Into<String>) {
        self.names
            .write()
            .expect("lock poisoned")
            .insert(cid, name.into());
    }

    /// Make lookups for `cid` fail.
    pub fn fail_for(&self, cid: Cid) {
        self.failing.write().expect("lock poisoned").insert(cid);
    }
}

impl std::fmt::Debug for StaticMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticMetadata")
            .field("names", &self.names.read().expect("lock poisoned").len())
            .finish()
    }
}

#[async_trait]
impl MetadataLookup for StaticMetadata {
    async fn lookup_name(&self, cid: &Cid) -> RegistryResult<Option<String>> {
        if self.failing.read().expect("lock poisoned").contains(cid) {
            return Err(RegistryError::Metadata(format!("lookup failed for {cid}")));
        }
        Ok(self.names.read().expect("lock poisoned").get(cid).cloned())
    }
}
