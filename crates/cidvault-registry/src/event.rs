use chrono::{DateTime, Utc};
use cidvault_types::{Account, Cid, Document, EventPosition, TxHash};
use serde::{Deserialize, Serialize};

/// One `DocumentRegistered` entry from the ledger's event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredEvent {
    pub owner: Account,
    pub cid: Cid,
    pub registered_at: DateTime<Utc>,
    pub position: EventPosition,
    pub tx_hash: Option<TxHash>,
}

impl RegisteredEvent {
    pub fn order_key(&self) -> (DateTime<Utc>, EventPosition) {
        (self.registered_at, self.position)
    }

    pub fn into_document(self, display_name: String) -> Document {
        Document {
            cid: self.cid,
            owner: self.owner,
            registered_at: self.registered_at,
            display_name,
            position: self.position,
            tx_hash: self.tx_hash,
        }
    }
}
