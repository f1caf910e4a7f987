use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cidvault_rpc::{parse_quantity, RpcClient, RpcError};
use cidvault_types::{Account, ChainId};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::keys::PublicKey;
use crate::provider::{IdentityProvider, ProviderEvent};

#[derive(Default)]
struct Observed {
    accounts: Option<Vec<Account>>,
    network: Option<ChainId>,
}

/// Identity provider reached over a JSON-RPC wallet endpoint.
///
/// HTTP has no push channel, so account and network changes are detected by
/// [`RpcIdentity::poll_changes`], usually driven by
/// [`RpcIdentity::spawn_watcher`].
pub struct RpcIdentity {
    client: RpcClient,
    events: broadcast::Sender<ProviderEvent>,
    observed: Mutex<Observed>,
}

impl RpcIdentity {
    pub fn new(client: RpcClient) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            client,
            events,
            observed: Mutex::new(Observed::default()),
        }
    }

    /// Compare the wallet's current state with the last observation and
    /// emit events for whatever changed. The first call only records state.
    pub async fn poll_changes(&self) -> Result<(), ProviderError> {
        let accounts = self.current_accounts().await?;
        let network = self.current_network().await?;

        let mut pending = Vec::new();
        {
            let mut observed = self.observed.lock().expect("lock poisoned");
            if let Some(previous) = &observed.accounts {
                if *previous != accounts {
                    pending.push(ProviderEvent::AccountsChanged(accounts.clone()));
                }
            }
            if let Some(previous) = observed.network {
                if previous != network {
                    pending.push(ProviderEvent::ChainChanged(network));
                }
            }
            observed.accounts = Some(accounts);
            observed.network = Some(network);
        }

        for event in pending {
            debug!(?event, "wallet state changed");
            let _ = self.events.send(event);
        }
        Ok(())
    }

    /// Poll for changes every `interval` until the returned task is aborted.
    pub fn spawn_watcher(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.poll_changes().await {
                    warn!(error = %e, "wallet poll failed");
                }
            }
        })
    }

    fn parse_accounts(raw: Vec<String>) -> Result<Vec<Account>, ProviderError> {
        raw.iter()
            .map(|s| {
                Account::from_hex(s)
                    .map_err(|e| ProviderError::Failed(format!("bad account {s:?}: {e}")))
            })
            .collect()
    }
}

fn map_rpc(err: RpcError) -> ProviderError {
    if err.is_user_rejected() {
        ProviderError::Rejected(err.to_string())
    } else if err.is_unavailable() || matches!(err, RpcError::Http { .. }) {
        ProviderError::Unavailable(err.to_string())
    } else {
        ProviderError::Failed(err.to_string())
    }
}

impl std::fmt::Debug for RpcIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcIdentity")
            .field("url", &self.client.url())
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for RpcIdentity {
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        let raw: Vec<String> = self
            .client
            .call("eth_requestAccounts", json!([]))
            .await
            .map_err(map_rpc)?;
        let accounts = Self::parse_accounts(raw)?;
        if accounts.is_empty() {
            return Err(ProviderError::Unavailable("wallet exposed no accounts".into()));
        }
        Ok(accounts)
    }

    async fn current_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        let raw: Vec<String> = self
            .client
            .call("eth_accounts", json!([]))
            .await
            .map_err(map_rpc)?;
        Self::parse_accounts(raw)
    }

    async fn current_network(&self) -> Result<ChainId, ProviderError> {
        let raw: String = self
            .client
            .call("eth_chainId", json!([]))
            .await
            .map_err(map_rpc)?;
        parse_quantity(&raw).map(ChainId).map_err(map_rpc)
    }

    async fn encryption_public_key(&self, account: &Account) -> Result<PublicKey, ProviderError> {
        let raw: String = self
            .client
            .call("eth_getEncryptionPublicKey", json!([account.to_hex()]))
            .await
            .map_err(map_rpc)?;
        PublicKey::from_base64(&raw).map_err(|e| ProviderError::Unavailable(e.to_string()))
    }

    async fn decrypt(
        &self,
        envelope_hex: &str,
        account: &Account,
    ) -> Result<String, ProviderError> {
        self.client
            .call("eth_decrypt", json!([envelope_hex, account.to_hex()]))
            .await
            .map_err(map_rpc)
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
