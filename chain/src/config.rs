//! Top-level configuration for a currency node.
//!
//! This module aggregates configuration for:
//!
//! - chain consensus parameters (`ChainParams`),
//! - peer synchronization (`SyncConfig`),
//! - proof-of-work mining (`MiningConfig`),
//! - metrics exposition (`MetricsConfig`),
//! - and the on-disk data layout (`DataConfig`).
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries can construct from defaults and command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::Amount;

/// Consensus-level chain parameters.
///
/// Every node in a network must agree on these for chains to be mutually
/// acceptable.
#[derive(Clone, Debug)]
pub struct ChainParams {
    /// Required number of leading ASCII `'0'` characters in a block hash.
    pub difficulty: u32,
    /// Reward credited to the miner address of every block.
    pub block_reward: Amount,
    /// Implicit starting balance of every address never seen on chain.
    ///
    /// A non-zero value bootstraps the economy: fresh addresses can spend
    /// before ever having received a transfer.
    pub new_address_balance: Amount,
    /// Upper bound on the number of transactions packaged into one block.
    pub max_block_txs: usize,
    /// Default confirmation count applied to balance queries that do not
    /// specify one.
    pub confirmations: u32,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            difficulty: 3,
            block_reward: Amount::from_whole(1),
            new_address_balance: Amount::from_whole(1),
            max_block_txs: 5,
            confirmations: 1,
        }
    }
}

/// Configuration for peer discovery and chain synchronization.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Bootstrap peers contacted on every sync iteration, as `host:port`.
    pub seed_peers: Vec<String>,
    /// Request timeout for all outbound peer HTTP calls.
    pub http_timeout: Duration,
    /// How long a peer stays listed without a successful contact.
    pub peer_lease: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            seed_peers: vec![
                "localhost:5000".to_string(),
                "localhost:5001".to_string(),
                "localhost:5002".to_string(),
                "localhost:5003".to_string(),
            ],
            http_timeout: Duration::from_secs(2),
            peer_lease: Duration::from_secs(300),
        }
    }
}

/// Tuning knobs for the proof-of-work search.
#[derive(Clone, Debug)]
pub struct MiningConfig {
    /// Nonces tried per mining round before yielding back to sync.
    pub intents: u32,
    /// Pause between hash attempts, yielding CPU to the request handler.
    pub nonce_sleep: Duration,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            intents: 1000,
            nonce_sleep: Duration::from_millis(10),
        }
    }
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to serve `/metrics` from the node's HTTP router.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// On-disk data layout.
///
/// Each node keeps its state under `{data_dir}/{port}/`: block files in a
/// `chaindata` subdirectory, the mempool database next to it.
#[derive(Clone, Debug)]
pub struct DataConfig {
    /// Root directory for all per-node state.
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Top-level configuration for a currency node.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub chain: ChainParams,
    pub sync: SyncConfig,
    pub mining: MiningConfig,
    pub metrics: MetricsConfig,
    pub data: DataConfig,
}
