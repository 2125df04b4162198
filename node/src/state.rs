//! Shared application state.

use std::sync::{Arc, Mutex};

use chain::{MempoolStore, MetricsRegistry, NodeConfig, NodeDirs, PeerSet};

/// State shared between the HTTP handlers and the mining thread.
///
/// The peer set is mutated from both sides; the mempool store sits
/// behind a mutex because its SQLite connection is not shareable. The
/// chain itself is deliberately absent: handlers re-read it from the
/// chain directory per request, and only the mining thread writes
/// there.
pub struct AppState {
    /// Node configuration, fixed at startup.
    pub config: NodeConfig,
    /// Per-node directory layout (chain data, mempool database).
    pub dirs: NodeDirs,
    /// Live peers, shared with the mining thread.
    pub peers: PeerSet,
    /// Durable transaction store, shared with the bundle builder.
    pub mempool: Arc<Mutex<MempoolStore>>,
    /// Metrics registry shared between the mining loop and the API.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
