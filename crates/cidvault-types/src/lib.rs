//! Foundation types for CidVault.
//!
//! This crate provides the identifiers and records shared by every other
//! CidVault crate, plus the text-safe codec used wherever binary payloads
//! cross a JSON or text channel.
//!
//! # Key Types
//!
//! - [`Cid`] -- Opaque content identifier issued by the blob store
//! - [`Account`] -- Identity-provider account (20-byte address)
//! - [`ChainId`] -- Network identifier reported by the identity provider
//! - [`TxHash`] -- Ledger transaction hash
//! - [`Document`] -- A registered CID, as reconstructed from the event log
//! - [`TransactionReceipt`] -- Finalized registration call

pub mod account;
pub mod cid;
pub mod codec;
pub mod document;
pub mod error;

pub use account::{Account, ChainId};
pub use cid::Cid;
pub use document::{Document, EventPosition, TransactionReceipt, TxHash};
pub use error::TypeError;
