//! Content-addressed blob store client for CidVault.
//!
//! Writes go to a single authoritative pinning endpoint; reads walk an
//! ordered list of mirror gateways and stop at the first success.
//!
//! # Seams
//!
//! - [`Pinner`] -- the write endpoint (`pin(payload, name) -> Cid`)
//! - [`Gateway`] -- one read endpoint (`get(cid) -> bytes`)
//!
//! # Implementations
//!
//! - [`PinataPinner`] / [`HttpGateway`] -- HTTP pinning service and gateways
//! - [`InMemoryBlobStore`] -- `HashMap`-backed store for tests and embedding
//!
//! # Design Rules
//!
//! 1. The store never interprets payloads; it stores and returns opaque bytes.
//! 2. Pinning is attempted once per call. Failures surface the endpoint's
//!    status and body.
//! 3. Mirror order is significant and stable: primary first.
//! 4. A fetch stops at the first mirror that answers with success.

pub mod blob_store;
pub mod error;
pub mod http;
pub mod memory;
pub mod mirror;
pub mod pinata;
pub mod traits;

pub use blob_store::BlobStore;
pub use error::{GatewayError, MirrorFailure, StoreError, StoreResult};
pub use http::HttpGateway;
pub use memory::{InMemoryBlobStore, MemoryGateway};
pub use mirror::MirrorSet;
pub use pinata::{PinataPinner, DEFAULT_PIN_NAME};
pub use traits::{Gateway, Pinner};
