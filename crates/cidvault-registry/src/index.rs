use std::sync::Arc;

use cidvault_crypto::NetworkGuard;
use cidvault_types::{Account, Cid, Document, TransactionReceipt, TxHash};
use tracing::{debug, info, warn};

use crate::error::RegistryResult;
use crate::traits::{LedgerClient, MetadataLookup};

/// Owner-indexed view of the registry ledger.
///
/// `register` is guarded and waits for finality. `list_by_owner` rebuilds an
/// owner's documents from the event log alone; it never consults the guard,
/// and a failed name lookup only downgrades that document's label.
#[derive(Clone)]
pub struct RegistryIndex {
    ledger: Arc<dyn LedgerClient>,
    metadata: Arc<dyn MetadataLookup>,
    guard: NetworkGuard,
}

impl RegistryIndex {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        metadata: Arc<dyn MetadataLookup>,
        guard: NetworkGuard,
    ) -> Self {
        Self {
            ledger,
            metadata,
            guard,
        }
    }

    /// Record `cid` for `account` and wait until the registration is final.
    pub async fn register(
        &self,
        account: &Account,
        cid: &Cid,
    ) -> RegistryResult<TransactionReceipt> {
        let tx_hash = self.submit(account, cid).await?;
        let receipt = self.await_finality(&tx_hash).await?;
        info!(%account, %cid, block = receipt.block_number, "document registered");
        Ok(receipt)
    }

    /// Guarded submission; returns once the signer approved the call.
    pub async fn submit(&self, account: &Account, cid: &Cid) -> RegistryResult<TxHash> {
        self.guard.assert_network().await?;
        let tx_hash = self.ledger.submit_registration(account, cid).await?;
        debug!(%tx_hash, %cid, "registration signed");
        Ok(tx_hash)
    }

    pub async fn await_finality(&self, tx_hash: &TxHash) -> RegistryResult<TransactionReceipt> {
        debug!(%tx_hash, "awaiting finality");
        self.ledger.await_finality(tx_hash).await
    }

    /// Documents registered by `account`, oldest first.
    ///
    /// An owner with no events yields an empty list.
    pub async fn list_by_owner(&self, account: &Account) -> RegistryResult<Vec<Document>> {
        let mut events = self.ledger.registered_events(account).await?;
        events.retain(|e| e.owner == *account);
        events.sort_by_key(|e| e.order_key());

        let mut documents = Vec::with_capacity(events.len());
        for event in events {
            let display_name = self.display_name(&event.cid).await;
            documents.push(event.into_document(display_name));
        }
        debug!(%account, count = documents.len(), "listed documents");
        Ok(documents)
    }

    /// Best-effort friendly name; falls back to the truncated CID.
    pub async fn display_name(&self, cid: &Cid) -> String {
        match self.metadata.lookup_name(cid).await {
            Ok(Some(name)) => name,
            Ok(None) => cid.short(),
            Err(e) => {
                warn!(%cid, error = %e, "name lookup failed; using CID");
                cid.short()
            }
        }
    }

    pub fn guard(&self) -> &NetworkGuard {
        &self.guard
    }
}

impl std::fmt::Debug for RegistryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryIndex")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
