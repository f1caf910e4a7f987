//! Publish and retrieve pipelines for CidVault.
//!
//! Publishing encrypts a file to its owner, pins the sealed envelope to the
//! blob store, and registers the resulting CID on the ledger. Retrieval lists
//! an owner's registrations, fetches a blob through the mirror set, and asks
//! the identity provider to decrypt it.
//!
//! Both flows are explicit state machines ([`PublishStage`],
//! [`RetrievalStage`]) with one attempt per step. A failed step ends the
//! session in `Failed` with a [`PipelineError`] that says whether the user
//! rejected something, a service failed, or the data was bad.
//!
//! A publish that fails after pinning leaves the pinned blob in the store
//! with no ledger entry. Such blobs are never swept or re-registered; a
//! retry pins a fresh copy.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod stage;

pub use config::{ConfigError, ConfigResult, VaultConfig};
pub use error::{FailureCategory, PipelineError, PipelineResult};
pub use pipeline::{Connection, DocumentListing, DocumentWatch, Pipeline};
pub use session::{PublishReceipt, PublishSession, RetrievalSession, RetrievedFile, SelectedFile};
pub use stage::{PublishStage, RetrievalStage, StageTransition};
