use std::sync::Arc;

use cidvault_types::{codec, Account};
use tracing::{debug, info};

use crate::envelope::CiphertextEnvelope;
use crate::error::{CryptoError, CryptoResult};
use crate::guard::NetworkGuard;
use crate::keys::PublicKey;
use crate::provider::IdentityProvider;

/// Seals files to their owner and asks the owner's provider to open them.
///
/// Plaintext bytes are base64-encoded before sealing so the provider's
/// text-only decrypt call can hand them back intact; the adapter reverses
/// that encoding after decryption.
#[derive(Clone)]
pub struct CryptoAdapter {
    provider: Arc<dyn IdentityProvider>,
    guard: NetworkGuard,
}

impl CryptoAdapter {
    pub fn new(provider: Arc<dyn IdentityProvider>, guard: NetworkGuard) -> Self {
        Self { provider, guard }
    }

    /// Fetch the owner's public encryption key from the provider.
    pub async fn get_public_key(&self, account: &Account) -> CryptoResult<PublicKey> {
        let key = self
            .provider
            .encryption_public_key(account)
            .await
            .map_err(CryptoError::from_identity)?;
        debug!(%account, "obtained encryption public key");
        Ok(key)
    }

    /// Seal plaintext bytes to `key`. Pure and local; no provider round trip.
    pub fn encrypt(&self, key: &PublicKey, plaintext: &[u8]) -> CryptoResult<CiphertextEnvelope> {
        let text = codec::encode_base64(plaintext);
        let envelope = CiphertextEnvelope::seal(key, text.as_bytes())?;
        debug!(
            plaintext_len = plaintext.len(),
            ciphertext_len = envelope.ciphertext.len(),
            "sealed payload"
        );
        Ok(envelope)
    }

    /// Ask the provider to open `envelope` for `account`.
    ///
    /// The network guard runs first; a malformed envelope is rejected before
    /// the provider is contacted.
    pub async fn decrypt(
        &self,
        envelope: &CiphertextEnvelope,
        account: &Account,
    ) -> CryptoResult<Vec<u8>> {
        self.guard.assert_network().await?;
        envelope.check_shape()?;
        let request = envelope.to_hex_request()?;

        info!(%account, "requesting decryption from identity provider");
        let text = self
            .provider
            .decrypt(&request, account)
            .await
            .map_err(CryptoError::from_decrypt)?;

        codec::decode_base64(&text)
            .map_err(|e| {
                CryptoError::DecryptionFailed(format!("decrypted payload not base64: {e}"))
            })
    }

    pub fn guard(&self) -> &NetworkGuard {
        &self.guard
    }
}

impl std::fmt::Debug for CryptoAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoAdapter")
            .field("guard", &self.guard)
            .finish()
    }
}
