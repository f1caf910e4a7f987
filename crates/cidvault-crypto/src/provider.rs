use async_trait::async_trait;
use cidvault_types::{Account, ChainId};
use tokio::sync::broadcast;

use crate::error::ProviderError;
use crate::keys::PublicKey;

/// Change notifications from the identity provider.
///
/// Consumers treat both as "invalidate and re-run read paths".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Account>),
    ChainChanged(ChainId),
}

/// The wallet capability surface CidVault consumes.
///
/// Implementations never expose private keys. Calls that may prompt the
/// user (`request_accounts`, `encryption_public_key`, `decrypt`) are
/// suspension points and can fail with [`ProviderError::Rejected`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Ask the user to connect; may prompt.
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError>;

    /// Accounts already connected, without prompting.
    async fn current_accounts(&self) -> Result<Vec<Account>, ProviderError>;

    /// The network the provider is currently attached to.
    async fn current_network(&self) -> Result<ChainId, ProviderError>;

    /// The account's public encryption key.
    async fn encryption_public_key(&self, account: &Account) -> Result<PublicKey, ProviderError>;

    /// Decrypt a hex-framed envelope for `account`, returning the plaintext string.
    async fn decrypt(&self, envelope_hex: &str, account: &Account) -> Result<String, ProviderError>;

    /// Subscribe to account and network change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
