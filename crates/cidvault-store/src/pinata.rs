use async_trait::async_trait;
use bytes::Bytes;
use cidvault_types::Cid;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::Pinner;

/// File name used when the caller gives no hint.
pub const DEFAULT_PIN_NAME: &str = "encrypted.dat";

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinning service speaking the Pinata `pinFileToIPFS` protocol.
///
/// Uploads are multipart: a `file` part holding the payload plus a
/// `pinataMetadata` JSON field carrying the display name.
#[derive(Clone)]
pub struct PinataPinner {
    endpoint: String,
    jwt: String,
    http: reqwest::Client,
}

impl PinataPinner {
    pub fn new(endpoint: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self::with_client(endpoint, jwt, reqwest::Client::new())
    }

    pub fn with_client(
        endpoint: impl Into<String>,
        jwt: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            jwt: jwt.into(),
            http,
        }
    }

    fn unavailable(&self, status: Option<u16>, body: impl Into<String>) -> StoreError {
        StoreError::StoreUnavailable {
            endpoint: self.endpoint.clone(),
            status,
            body: body.into(),
        }
    }
}

impl std::fmt::Debug for PinataPinner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataPinner")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Pinner for PinataPinner {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn pin(&self, payload: Bytes, name_hint: Option<&str>) -> StoreResult<Cid> {
        let name = name_hint.unwrap_or(DEFAULT_PIN_NAME).to_string();
        let metadata = json!({ "name": name }).to_string();
        let form = Form::new()
            .part("file", Part::bytes(payload.to_vec()).file_name(name.clone()))
            .text("pinataMetadata", metadata);

        debug!(
            endpoint = %self.endpoint,
            %name,
            len = payload.len(),
            "uploading to pinning service"
        );
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.unavailable(None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.unavailable(Some(status.as_u16()), e.to_string()))?;
        if !status.is_success() {
            warn!(endpoint = %self.endpoint, status = status.as_u16(), "pinning rejected");
            return Err(self.unavailable(Some(status.as_u16()), body));
        }

        let parsed: PinResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::InvalidResponse {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        Cid::new(parsed.ipfs_hash).map_err(|e| StoreError::InvalidResponse {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }
}
