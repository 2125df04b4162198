//! Peer discovery and chain synchronization.
//!
//! This module holds everything a node needs to keep up with its peers:
//!
//! - [`peers::PeerSet`]: the live set of peer URLs with last-seen times,
//!   shared between the request handler and the mining loop,
//! - [`client::PeerApi`] and its HTTP implementation
//!   [`client::HttpPeerClient`]: outbound calls to other nodes,
//! - [`synchronizer::Synchronizer`]: per-iteration peer refresh and
//!   longest-valid-chain adoption,
//! - [`payload::PayloadBuilder`] with its two flavours: a plain label
//!   and the fee-ordered transaction bundle built from the mempool.

pub mod client;
pub mod payload;
pub mod peers;
pub mod synchronizer;

pub use client::{HttpPeerClient, PeerApi, PeerError};
pub use payload::{BundleBuilder, LabelPayload, PayloadBuilder};
pub use peers::PeerSet;
pub use synchronizer::Synchronizer;
