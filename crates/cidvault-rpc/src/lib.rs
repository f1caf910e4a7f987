//! JSON-RPC 2.0 transport for CidVault.
//!
//! The identity provider and the ledger are both reached through a wallet
//! endpoint that speaks the Ethereum JSON-RPC dialect. This crate owns the
//! request/response framing, provider error codes, and hex quantity helpers;
//! it knows nothing about what the calls mean.

pub mod client;
pub mod error;
pub mod message;
pub mod quantity;

pub use client::RpcClient;
pub use error::{RpcError, RpcResult};
pub use message::{codes, RpcErrorObject, RpcRequest, RpcResponse, JSONRPC_VERSION};
pub use quantity::{parse_quantity, to_quantity};
