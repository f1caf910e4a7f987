//! Client-side encryption for CidVault.
//!
//! Files are sealed to the owner's public encryption key before they leave
//! the machine. Opening an envelope is never done here with a raw private
//! key: the owner's identity provider performs decryption on request, and
//! may prompt the user before doing so.
//!
//! - [`CiphertextEnvelope`] -- versioned, self-describing sealed payload
//! - [`IdentityProvider`] -- the wallet capability surface CidVault consumes
//! - [`CryptoAdapter`] -- public-key lookup, sealing, and delegated opening
//! - [`NetworkGuard`] -- fail-closed check of the provider's connected network
//! - [`LocalIdentity`] -- in-process provider for tests and embedding
//! - [`RpcIdentity`] -- provider reached over a JSON-RPC wallet endpoint

pub mod adapter;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod keys;
pub mod local;
pub mod provider;
pub mod rpc;

pub use adapter::CryptoAdapter;
pub use envelope::{CiphertextEnvelope, ENVELOPE_VERSION};
pub use error::{CryptoError, CryptoResult, ProviderError};
pub use guard::NetworkGuard;
pub use keys::{EncryptionKeyPair, PublicKey, SecretKey};
pub use local::{DecryptPolicy, LocalIdentity};
pub use provider::{IdentityProvider, ProviderEvent};
pub use rpc::RpcIdentity;
