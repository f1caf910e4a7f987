use std::sync::Arc;

use cidvault_types::ChainId;
use tracing::{debug, warn};

use crate::error::{CryptoError, CryptoResult};
use crate::provider::IdentityProvider;

/// Fail-closed check that the identity provider is attached to the expected
/// network.
///
/// Run before every registration and every decrypt request. Read-only paths
/// (listing, fetching) do not consult the guard.
#[derive(Clone)]
pub struct NetworkGuard {
    provider: Arc<dyn IdentityProvider>,
    expected: ChainId,
}

impl NetworkGuard {
    pub fn new(provider: Arc<dyn IdentityProvider>, expected: ChainId) -> Self {
        Self { provider, expected }
    }

    pub fn expected(&self) -> ChainId {
        self.expected
    }

    /// Fails with [`CryptoError::WrongNetwork`] unless the provider reports
    /// the expected chain. An unreachable provider fails as
    /// [`CryptoError::IdentityUnavailable`].
    pub async fn assert_network(&self) -> CryptoResult<()> {
        let actual = self
            .provider
            .current_network()
            .await
            .map_err(CryptoError::from_identity)?;
        if actual != self.expected {
            warn!(expected = %self.expected, actual = %actual, "network guard tripped");
            return Err(CryptoError::WrongNetwork {
                expected: self.expected,
                actual,
            });
        }
        debug!(chain = %actual, "network guard passed");
        Ok(())
    }
}

impl std::fmt::Debug for NetworkGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkGuard")
            .field("expected", &self.expected)
            .finish()
    }
}
