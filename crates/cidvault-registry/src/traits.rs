use async_trait::async_trait;
use cidvault_types::{Account, Cid, TransactionReceipt, TxHash};

use crate::error::RegistryResult;
use crate::event::RegisteredEvent;

/// Boundary to the ledger that records CID registrations.
///
/// Implementations must satisfy:
/// - `submit_registration` performs exactly one state-changing call and
///   returns once the signer has approved it.
/// - An event becomes visible to `registered_events` only after the
///   registration reached finality.
/// - The event log is append-only.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit `registerDocument(cid)` signed by `owner`.
    async fn submit_registration(&self, owner: &Account, cid: &Cid) -> RegistryResult<TxHash>;

    /// Wait until `tx_hash` is final and return its receipt.
    async fn await_finality(&self, tx_hash: &TxHash) -> RegistryResult<TransactionReceipt>;

    /// Every registration event emitted for `owner`.
    async fn registered_events(&self, owner: &Account) -> RegistryResult<Vec<RegisteredEvent>>;
}

/// Optional side index mapping CIDs to friendly names.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup_name(&self, cid: &Cid) -> RegistryResult<Option<String>>;
}
