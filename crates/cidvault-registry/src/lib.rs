//! Owner-indexed document registry for CidVault.
//!
//! The ledger is used purely as an index: one state-changing call records a
//! CID for its signer, and the ledger's event log is the only source from
//! which an owner's documents are enumerated.
//!
//! - `LedgerClient` / `MetadataLookup` trait boundaries
//! - `InMemoryLedger` for tests and embedding
//! - `RpcLedger` speaking to a registry contract over JSON-RPC
//! - `RegistryIndex`: guarded registration and ordered owner listings

pub mod abi;
pub mod error;
pub mod event;
pub mod index;
pub mod memory;
pub mod metadata;
pub mod rpc;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use event::RegisteredEvent;
pub use index::RegistryIndex;
pub use memory::{InMemoryLedger, SubmitPolicy};
pub use metadata::{NoMetadata, PinataMetadata, StaticMetadata};
pub use rpc::{RpcLedger, RpcLedgerOptions};
pub use traits::{LedgerClient, MetadataLookup};
