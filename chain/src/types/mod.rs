//! Core domain types used by the chain.
//!
//! This module defines the monetary amount representation, the signed
//! transaction and transaction bundle, and the block itself. All types
//! (de)serialize to the JSON shapes used on the wire and on disk.

pub mod amount;
pub mod block;
pub mod tx;

pub use amount::Amount;
pub use block::{Block, calculate_hash, utc_timestamp};
pub use tx::{Transaction, TransactionBundle};

/// Hex length of an address (the raw `x || y` public key point on P-256).
pub const ADDRESS_HEX_LEN: usize = 128;
