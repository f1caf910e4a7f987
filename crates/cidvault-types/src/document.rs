use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::cid::Cid;
use crate::error::TypeError;

/// Hash of a ledger transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let stripped = s.trim().trim_start_matches("0x");
        let bytes = hex::decode(stripped).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| TypeError::InvalidLength {
                expected: 32,
                actual: b.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash(0x{}…)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for TxHash {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_hex()
    }
}

/// Position of an event in the ledger's log.
///
/// Ordering is `block_number` then `log_index`, which is the ledger's own
/// total order over events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventPosition {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

/// A finalized registration call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Block time of the block that included the call.
    pub registered_at: DateTime<Utc>,
}

/// A CID registered for an owner.
///
/// Documents are reconstructed from the ledger's event log. They are
/// immutable: the ledger is append-only, so a document can be superseded by
/// a later registration but never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub cid: Cid,
    pub owner: Account,
    pub registered_at: DateTime<Utc>,
    /// Best-effort label: side-metadata name, or a truncated CID.
    pub display_name: String,
    pub position: EventPosition,
    pub tx_hash: Option<TxHash>,
}

impl Document {
    /// Sort key for ascending registration order.
    pub fn order_key(&self) -> (DateTime<Utc>, EventPosition) {
        (self.registered_at, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tx_hash_hex_roundtrip() {
        let hash = TxHash::from_bytes([0x5a; 32]);
        let parsed = TxHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn tx_hash_rejects_short_input() {
        let err = TxHash::from_hex("0xabcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn positions_order_by_block_then_log() {
        assert!(EventPosition::new(1, 9) < EventPosition::new(2, 0));
        assert!(EventPosition::new(2, 0) < EventPosition::new(2, 1));
    }

    #[test]
    fn order_key_prefers_timestamp() {
        let owner = Account::from_label("alice");
        let earlier = Document {
            cid: Cid::new("bafyearly").unwrap(),
            owner,
            registered_at: Utc.timestamp_opt(100, 0).unwrap(),
            display_name: "a".into(),
            position: EventPosition::new(9, 0),
            tx_hash: None,
        };
        let later = Document {
            cid: Cid::new("bafylate").unwrap(),
            registered_at: Utc.timestamp_opt(200, 0).unwrap(),
            position: EventPosition::new(1, 0),
            ..earlier.clone()
        };
        assert!(earlier.order_key() < later.order_key());
    }
}
