use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use cidvault_types::{codec, Account, ChainId};
use tokio::sync::broadcast;
use tracing::debug;

use crate::envelope::CiphertextEnvelope;
use crate::error::ProviderError;
use crate::keys::{EncryptionKeyPair, PublicKey};
use crate::provider::{IdentityProvider, ProviderEvent};

/// How a [`LocalIdentity`] answers decrypt prompts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecryptPolicy {
    Approve,
    Deny,
}

struct LocalState {
    reachable: bool,
    network: ChainId,
    /// First entry is the selected account.
    accounts: Vec<(Account, EncryptionKeyPair)>,
    decrypt_policy: DecryptPolicy,
}

/// In-process identity provider.
///
/// Holds per-account X25519 key pairs and a switchable network, and answers
/// prompts according to a configurable policy. Intended for tests and for
/// embedding CidVault where the host application owns the keys.
pub struct LocalIdentity {
    state: RwLock<LocalState>,
    events: broadcast::Sender<ProviderEvent>,
    decrypt_calls: AtomicUsize,
}

impl LocalIdentity {
    pub fn new(network: ChainId) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(LocalState {
                reachable: true,
                network,
                accounts: Vec::new(),
                decrypt_policy: DecryptPolicy::Approve,
            }),
            events,
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    /// Create an account with a fresh key pair derived under `label`.
    pub fn add_account(&self, label: &str) -> Account {
        self.add_account_with_keys(Account::from_label(label), EncryptionKeyPair::generate())
    }

    pub fn add_account_with_keys(&self, account: Account, keys: EncryptionKeyPair) -> Account {
        let accounts = {
            let mut state = self.state.write().expect("lock poisoned");
            state.accounts.retain(|(a, _)| *a != account);
            state.accounts.push((account, keys));
            state.accounts.iter().map(|(a, _)| *a).collect::<Vec<_>>()
        };
        let _ = self.events.send(ProviderEvent::AccountsChanged(accounts));
        account
    }

    /// Make `account` the selected (first) account.
    pub fn select_account(&self, account: &Account) -> bool {
        let accounts = {
            let mut state = self.state.write().expect("lock poisoned");
            let Some(index) = state.accounts.iter().position(|(a, _)| a == account) else {
                return false;
            };
            let entry = state.accounts.remove(index);
            state.accounts.insert(0, entry);
            state.accounts.iter().map(|(a, _)| *a).collect::<Vec<_>>()
        };
        let _ = self.events.send(ProviderEvent::AccountsChanged(accounts));
        true
    }

    pub fn switch_network(&self, network: ChainId) {
        self.state.write().expect("lock poisoned").network = network;
        debug!(chain = %network, "local identity switched network");
        let _ = self.events.send(ProviderEvent::ChainChanged(network));
    }

    pub fn set_decrypt_policy(&self, policy: DecryptPolicy) {
        self.state.write().expect("lock poisoned").decrypt_policy = policy;
    }

    /// Simulate the provider going away entirely.
    pub fn disconnect(&self) {
        self.state.write().expect("lock poisoned").reachable = false;
    }

    pub fn reconnect(&self) {
        self.state.write().expect("lock poisoned").reachable = true;
    }

    /// Number of decrypt requests that reached the provider.
    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> Result<(), ProviderError> {
        if self.state.read().expect("lock poisoned").reachable {
            Ok(())
        } else {
            Err(ProviderError::Unavailable("no identity provider connected".into()))
        }
    }
}

impl std::fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("LocalIdentity")
            .field("network", &state.network)
            .field("account_count", &state.accounts.len())
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        let accounts = self.current_accounts().await?;
        if accounts.is_empty() {
            return Err(ProviderError::Unavailable("wallet has no accounts".into()));
        }
        Ok(accounts)
    }

    async fn current_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        self.ensure_reachable()?;
        let state = self.state.read().expect("lock poisoned");
        Ok(state.accounts.iter().map(|(a, _)| *a).collect())
    }

    async fn current_network(&self) -> Result<ChainId, ProviderError> {
        self.ensure_reachable()?;
        Ok(self.state.read().expect("lock poisoned").network)
    }

    async fn encryption_public_key(&self, account: &Account) -> Result<PublicKey, ProviderError> {
        self.ensure_reachable()?;
        let state = self.state.read().expect("lock poisoned");
        state
            .accounts
            .iter()
            .find(|(a, _)| a == account)
            .map(|(_, keys)| keys.public_key())
            .ok_or_else(|| ProviderError::Unavailable(format!("no encryption key for {account}")))
    }

    async fn decrypt(
        &self,
        envelope_hex: &str,
        account: &Account,
    ) -> Result<String, ProviderError> {
        self.ensure_reachable()?;
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

        let state = self.state.read().expect("lock poisoned");
        if state.decrypt_policy == DecryptPolicy::Deny {
            return Err(ProviderError::Rejected("user denied decryption".into()));
        }
        let keys = state
            .accounts
            .iter()
            .find(|(a, _)| a == account)
            .map(|(_, keys)| keys)
            .ok_or_else(|| ProviderError::Unavailable(format!("unknown account {account}")))?;

        let envelope = CiphertextEnvelope::from_hex_request(envelope_hex)
            .map_err(|e| ProviderError::Failed(e.to_string()))?;
        let plaintext = envelope
            .open(keys.secret_key())
            .map_err(|e| ProviderError::Failed(e.to_string()))?;
        codec::utf8_from_bytes(plaintext).map_err(|e| ProviderError::Failed(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accounts_and_keys() {
        let wallet = LocalIdentity::new(ChainId::SEPOLIA);
        let alice = wallet.add_account("alice");
        assert_eq!(wallet.request_accounts().await.unwrap(), vec![alice]);
        assert!(wallet.encryption_public_key(&alice).await.is_ok());
        let stranger = Account::from_label("mallory");
        assert!(matches!(
            wallet.encryption_public_key(&stranger).await,
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn empty_wallet_cannot_connect() {
        let wallet = LocalIdentity::new(ChainId::SEPOLIA);
        assert!(matches!(
            wallet.request_accounts().await,
            Err(ProviderError::Unavailable(_))
        ));
        assert!(wallet.current_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn decrypts_text_for_owner() {
        let wallet = LocalIdentity::new(ChainId::SEPOLIA);
        let alice = wallet.add_account("alice");
        let key = wallet.encryption_public_key(&alice).await.unwrap();
        let envelope = CiphertextEnvelope::seal(&key, b"hello").unwrap();
        let plain = wallet
            .decrypt(&envelope.to_hex_request().unwrap(), &alice)
            .await
            .unwrap();
        assert_eq!(plain, "hello");
        assert_eq!(wallet.decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn deny_policy_rejects() {
        let wallet = LocalIdentity::new(ChainId::SEPOLIA);
        let alice = wallet.add_account("alice");
        wallet.set_decrypt_policy(DecryptPolicy::Deny);
        let key = wallet.encryption_public_key(&alice).await.unwrap();
        let envelope = CiphertextEnvelope::seal(&key, b"hello").unwrap();
        assert!(matches!(
            wallet.decrypt(&envelope.to_hex_request().unwrap(), &alice).await,
            Err(ProviderError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn other_accounts_key_fails() {
        let wallet = LocalIdentity::new(ChainId::SEPOLIA);
        let alice = wallet.add_account("alice");
        let bob = wallet.add_account("bob");
        let key = wallet.encryption_public_key(&alice).await.unwrap();
        let envelope = CiphertextEnvelope::seal(&key, b"for alice").unwrap();
        assert!(matches!(
            wallet.decrypt(&envelope.to_hex_request().unwrap(), &bob).await,
            Err(ProviderError::Failed(_))
        ));
    }

    #[tokio::test]
    async fn emits_change_events() {
        let wallet = LocalIdentity::new(ChainId::SEPOLIA);
        let mut events = wallet.subscribe();
        let alice = wallet.add_account("alice");
        let bob = wallet.add_account("bob");
        wallet.switch_network(ChainId::MAINNET);
        assert!(wallet.select_account(&bob));

        assert_eq!(
            events.recv().await.unwrap(),
            ProviderEvent::AccountsChanged(vec![alice])
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ProviderEvent::AccountsChanged(vec![alice, bob])
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ProviderEvent::ChainChanged(ChainId::MAINNET)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ProviderEvent::AccountsChanged(vec![bob, alice])
        );
    }

    #[tokio::test]
    async fn disconnected_wallet_is_unavailable() {
        let wallet = LocalIdentity::new(ChainId::SEPOLIA);
        wallet.add_account("alice");
        wallet.disconnect();
        assert!(matches!(
            wallet.current_network().await,
            Err(ProviderError::Unavailable(_))
        ));
        wallet.reconnect();
        assert!(wallet.current_network().await.is_ok());
    }
}
