//! Chain library crate.
//!
//! This crate provides the core building blocks for a prototype
//! peer-to-peer proof-of-work cryptocurrency:
//!
//! - strongly-typed domain types (`types`),
//! - ECDSA key handling for addresses and signatures (`crypto`),
//! - plain and transaction-aware block chains (`blockchain`),
//! - a durable transaction mempool (`mempool`),
//! - peer tracking and chain synchronization (`sync`),
//! - the proof-of-work mining loop (`mining`),
//! - on-disk chain storage (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces to build full mining nodes
//! that expose the wire API over HTTP.

pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod mempool;
pub mod metrics;
pub mod mining;
pub mod storage;
pub mod sync;
pub mod types;

// Re-export top-level configuration types.
pub use config::{ChainParams, DataConfig, MetricsConfig, MiningConfig, NodeConfig, SyncConfig};

// Re-export the chain interface and its two concrete flavours.
pub use blockchain::{BlockChain, Chain, ChainError, TxChain, confirmations, fork_point};

// Re-export crypto helpers.
pub use crypto::{Keypair, could_be_valid_address, verify_signature};

// Re-export the mempool store.
pub use mempool::{MempoolStore, StoreError};

// Re-export metrics registry.
pub use metrics::{MetricsRegistry, NodeMetrics};

// Re-export the mining loop driver.
pub use mining::MinerLoop;

// Re-export on-disk storage helpers.
pub use storage::{NodeDirs, StorageError};

// Re-export synchronization interfaces and the HTTP peer client.
pub use sync::{
    BundleBuilder, HttpPeerClient, LabelPayload, PayloadBuilder, PeerApi, PeerError, PeerSet,
    Synchronizer,
};

// Re-export domain types at the crate root for convenience.
pub use types::{Amount, Block, Transaction, TransactionBundle};

/// Type alias for the chain flavour a "typical" currency node runs.
pub type DefaultChain = TxChain;

/// Type alias for the default mining loop stack.
///
/// This uses:
///
/// - [`TxChain`] (transaction-aware chain),
/// - [`HttpPeerClient`] for peer traffic,
/// - [`BundleBuilder`] to assemble fee-ordered block payloads.
pub type DefaultMinerLoop = MinerLoop<TxChain, HttpPeerClient, BundleBuilder<HttpPeerClient>>;
