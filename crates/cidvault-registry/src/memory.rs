use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cidvault_types::{Account, Cid, EventPosition, TransactionReceipt, TxHash};
use tracing::debug;

use crate::abi::keccak256;
use crate::error::{RegistryError, RegistryResult};
use crate::event::RegisteredEvent;
use crate::traits::LedgerClient;

const BLOCK_SECONDS: i64 = 12;

/// How an [`InMemoryLedger`] treats the next submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitPolicy {
    /// Sign and include normally.
    Accept,
    /// The signer declines; nothing is submitted.
    Reject,
    /// The call is signed but reverts on inclusion.
    Revert,
}

struct Pending {
    owner: Account,
    cid: Cid,
    reverts: bool,
}

struct LedgerState {
    head: u64,
    nonce: u64,
    events: Vec<RegisteredEvent>,
    pending: HashMap<TxHash, Pending>,
    policy: SubmitPolicy,
    logs_offline: bool,
}

/// In-memory registry ledger for tests, local demos, and embedding.
///
/// Every finalized registration mines one block; block times advance by a
/// fixed interval from the genesis time.
pub struct InMemoryLedger {
    genesis: DateTime<Utc>,
    inner: RwLock<LedgerState>,
    submit_calls: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_genesis(Utc::now())
    }

    pub fn with_genesis(genesis: DateTime<Utc>) -> Self {
        Self {
            genesis,
            inner: RwLock::new(LedgerState {
                head: 0,
                nonce: 0,
                events: Vec::new(),
                pending: HashMap::new(),
                policy: SubmitPolicy::Accept,
                logs_offline: false,
            }),
            submit_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_policy(&self, policy: SubmitPolicy) {
        self.inner.write().expect("lock poisoned").policy = policy;
    }

    /// While offline, event-log queries fail as a node outage would.
    pub fn set_logs_offline(&self, offline: bool) {
        self.inner.write().expect("lock poisoned").logs_offline = offline;
    }

    /// Number of `submit_registration` calls received, including declined ones.
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn head(&self) -> u64 {
        self.inner.read().expect("lock poisoned").head
    }

    pub fn event_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").events.len()
    }

    /// All events in log order, regardless of owner.
    pub fn events(&self) -> Vec<RegisteredEvent> {
        self.inner.read().expect("lock poisoned").events.clone()
    }

    /// Mine a block holding a registration with an explicit block time, as if
    /// another client had registered it.
    pub fn append_event(
        &self,
        owner: Account,
        cid: Cid,
        registered_at: DateTime<Utc>,
    ) -> RegisteredEvent {
        let mut state = self.inner.write().expect("lock poisoned");
        state.head += 1;
        let event = RegisteredEvent {
            owner,
            cid,
            registered_at,
            position: EventPosition::new(state.head, 0),
            tx_hash: None,
        };
        state.events.push(event.clone());
        event
    }

    fn block_time(&self, block: u64) -> DateTime<Utc> {
        self.genesis + Duration::seconds(BLOCK_SECONDS.saturating_mul(block as i64))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit_registration(&self, owner: &Account, cid: &Cid) -> RegistryResult<TxHash> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.inner.write().expect("lock poisoned");
        if state.policy == SubmitPolicy::Reject {
            return Err(RegistryError::RegistrationRejected(
                "user denied transaction signature".into(),
            ));
        }

        state.nonce += 1;
        let mut preimage = owner.as_bytes().to_vec();
        preimage.extend_from_slice(cid.as_str().as_bytes());
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        let tx_hash = TxHash::from_bytes(keccak256(&preimage));

        let reverts = state.policy == SubmitPolicy::Revert;
        state.pending.insert(
            tx_hash,
            Pending {
                owner: *owner,
                cid: cid.clone(),
                reverts,
            },
        );
        debug!(%tx_hash, %cid, "registration submitted");
        Ok(tx_hash)
    }

    async fn await_finality(&self, tx_hash: &TxHash) -> RegistryResult<TransactionReceipt> {
        let mut state = self.inner.write().expect("lock poisoned");
        let pending = state
            .pending
            .remove(tx_hash)
            .ok_or_else(|| RegistryError::Ledger(format!("unknown transaction {tx_hash}")))?;
        if pending.reverts {
            return Err(RegistryError::RegistrationReverted {
                tx_hash: *tx_hash,
                reason: "execution reverted".into(),
            });
        }

        state.head += 1;
        let block_number = state.head;
        let registered_at = self.block_time(block_number);
        state.events.push(RegisteredEvent {
            owner: pending.owner,
            cid: pending.cid,
            registered_at,
            position: EventPosition::new(block_number, 0),
            tx_hash: Some(*tx_hash),
        });

        Ok(TransactionReceipt {
            tx_hash: *tx_hash,
            block_number,
            registered_at,
        })
    }

    async fn registered_events(&self, owner: &Account) -> RegistryResult<Vec<RegisteredEvent>> {
        let state = self.inner.read().expect("lock poisoned");
        if state.logs_offline {
            return Err(RegistryError::Ledger("event log unavailable".into()));
        }
        Ok(state
            .events
            .iter()
            .filter(|e| e.owner == *owner)
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read().expect("lock poisoned");
        f.debug_struct("InMemoryLedger")
            .field("head", &state.head)
            .field("event_count", &state.events.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}
