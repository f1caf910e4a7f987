use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use cidvault_types::{Account, Cid, Document, TransactionReceipt, TxHash};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::stage::{PublishStage, RetrievalStage, StageTransition};

/// A file chosen for publishing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    /// Used as the blob store's name hint.
    pub name: Option<String>,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: Some(name.into()),
            bytes: bytes.into(),
        }
    }

    pub fn anonymous(bytes: impl Into<Bytes>) -> Self {
        Self {
            name: None,
            bytes: bytes.into(),
        }
    }
}

/// Outcome of a completed publish.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub cid: Cid,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub registered_at: DateTime<Utc>,
}

/// State of one publish invocation.
///
/// Sessions are owned by the call that created them and are never shared.
/// A session that failed after pinning still reports its CID: that blob is
/// left in the store unregistered.
#[derive(Debug)]
pub struct PublishSession {
    id: Uuid,
    pub(crate) file: SelectedFile,
    stage: PublishStage,
    entered_at: Instant,
    pub(crate) cid: Option<Cid>,
    pub(crate) tx_hash: Option<TxHash>,
    pub(crate) receipt: Option<TransactionReceipt>,
    transitions: Vec<StageTransition>,
}

impl PublishSession {
    pub(crate) fn new(file: SelectedFile) -> Self {
        Self {
            id: Uuid::now_v7(),
            file,
            stage: PublishStage::Idle,
            entered_at: Instant::now(),
            cid: None,
            tx_hash: None,
            receipt: None,
            transitions: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub fn stage(&self) -> &PublishStage {
        &self.stage
    }

    pub fn cid(&self) -> Option<&Cid> {
        self.cid.as_ref()
    }

    pub fn tx_hash(&self) -> Option<&TxHash> {
        self.tx_hash.as_ref()
    }

    pub fn receipt(&self) -> Option<&TransactionReceipt> {
        self.receipt.as_ref()
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    pub fn last_error(&self) -> Option<&PipelineError> {
        match &self.stage {
            PublishStage::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Pinned but never registered.
    pub fn is_orphaned(&self) -> bool {
        self.cid.is_some() && self.receipt.is_none() && self.stage.is_terminal()
    }

    pub fn into_result(self) -> PipelineResult<PublishReceipt> {
        match (self.stage, self.cid, self.receipt) {
            (PublishStage::Done, Some(cid), Some(receipt)) => Ok(PublishReceipt {
                cid,
                tx_hash: receipt.tx_hash,
                block_number: receipt.block_number,
                registered_at: receipt.registered_at,
            }),
            (PublishStage::Failed(err), _, _) => Err(err),
            (stage, _, _) => Err(PipelineError::LedgerUnavailable(format!(
                "publish session ended in stage {}",
                stage.name()
            ))),
        }
    }

    pub(crate) fn advance(&mut self, next: PublishStage) {
        if !self.stage.can_advance_to(&next) {
            warn!(
                session = %self.id,
                from = self.stage.name(),
                to = next.name(),
                "unexpected publish transition"
            );
        }
        let transition = StageTransition {
            from: self.stage.name(),
            to: next.name(),
            elapsed: self.entered_at.elapsed(),
        };
        debug!(
            session = %self.id,
            from = transition.from,
            to = transition.to,
            elapsed_ms = transition.elapsed.as_millis() as u64,
            "publish stage"
        );
        self.transitions.push(transition);
        self.stage = next;
        self.entered_at = Instant::now();
    }

    pub(crate) fn fail(&mut self, err: PipelineError) {
        warn!(session = %self.id, stage = self.stage.name(), error = %err, "publish failed");
        self.advance(PublishStage::Failed(err));
    }
}

/// A decrypted file, ready to save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievedFile {
    pub cid: Cid,
    /// Display name of the document, or the CID when retrieved directly.
    pub name: String,
    pub bytes: Bytes,
}

/// State of one retrieve invocation for one account.
///
/// After `Ready` the session can fetch another document or re-list. A failed
/// session stays failed; start a new one to try again.
#[derive(Debug)]
pub struct RetrievalSession {
    id: Uuid,
    account: Account,
    stage: RetrievalStage,
    entered_at: Instant,
    pub(crate) documents: Vec<Document>,
    pub(crate) cid: Option<Cid>,
    pub(crate) raw_envelope_text: Option<String>,
    pub(crate) decrypted: Option<RetrievedFile>,
    transitions: Vec<StageTransition>,
}

impl RetrievalSession {
    pub fn new(account: Account) -> Self {
        Self {
            id: Uuid::now_v7(),
            account,
            stage: RetrievalStage::Idle,
            entered_at: Instant::now(),
            documents: Vec::new(),
            cid: None,
            raw_envelope_text: None,
            decrypted: None,
            transitions: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn stage(&self) -> &RetrievalStage {
        &self.stage
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn cid(&self) -> Option<&Cid> {
        self.cid.as_ref()
    }

    pub fn raw_envelope_text(&self) -> Option<&str> {
        self.raw_envelope_text.as_deref()
    }

    pub fn decrypted(&self) -> Option<&RetrievedFile> {
        self.decrypted.as_ref()
    }

    pub fn take_decrypted(&mut self) -> Option<RetrievedFile> {
        self.decrypted.take()
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    pub fn last_error(&self) -> Option<&PipelineError> {
        match &self.stage {
            RetrievalStage::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Name for `cid`, taken from the current listing when present.
    pub(crate) fn name_for(&self, cid: &Cid) -> String {
        self.documents
            .iter()
            .find(|d| d.cid == *cid)
            .map(|d| d.display_name.clone())
            .unwrap_or_else(|| cid.to_string())
    }

    pub(crate) fn ensure_live(&self) -> PipelineResult<()> {
        match self.last_error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn advance(&mut self, next: RetrievalStage) {
        if !self.stage.can_advance_to(&next) {
            warn!(
                session = %self.id,
                from = self.stage.name(),
                to = next.name(),
                "unexpected retrieval transition"
            );
        }
        let transition = StageTransition {
            from: self.stage.name(),
            to: next.name(),
            elapsed: self.entered_at.elapsed(),
        };
        debug!(
            session = %self.id,
            from = transition.from,
            to = transition.to,
            elapsed_ms = transition.elapsed.as_millis() as u64,
            "retrieval stage"
        );
        self.transitions.push(transition);
        self.stage = next;
        self.entered_at = Instant::now();
    }

    /// Terminate the session and hand back the error.
    pub(crate) fn fail(&mut self, err: PipelineError) -> PipelineError {
        warn!(session = %self.id, stage = self.stage.name(), error = %err, "retrieval failed");
        self.advance(RetrievalStage::Failed(err.clone()));
        err
    }
}
