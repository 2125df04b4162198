//! Mining node binary.
//!
//! This binary wires the `chain` crate into a full node:
//!
//! - an HTTP service exposing the wire API (chain, blocks, peers,
//!   transaction submission, balances, confirmations),
//! - a background mining thread that synchronizes with peers and
//!   grinds proof-of-work,
//! - shared state (peer set, mempool store, running flag) between the
//!   two.
//!
//! Several nodes started against each other converge on the longest
//! valid chain; transactions submitted to any node spread by gossip.

mod cli;
mod routes;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::{get, put};
use clap::Parser;
use tokio::signal;

use chain::{
    BundleBuilder, Chain, DefaultMinerLoop, HttpPeerClient, Keypair, MempoolStore,
    MetricsRegistry, MinerLoop, NodeConfig, NodeDirs, PeerSet, Synchronizer, TxChain,
    could_be_valid_address,
};

use cli::Cli;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "node=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    // ---------------------------
    // Port resolution
    // ---------------------------

    let port = match cli.port {
        Some(port) => {
            if !cli::port_is_free(&cli.host, port) {
                return Err(format!("port {port} is already in use"));
            }
            port
        }
        None => cli::pick_free_port(&cli.host)
            .ok_or_else(|| "no free port at or above 5000".to_string())?,
    };
    let self_url = format!("{}:{}", cli.host, port);

    // ---------------------------
    // Configuration
    // ---------------------------

    let mut config = NodeConfig::default();
    config.data.data_dir = cli.data_dir.clone();
    if let Some(difficulty) = cli.difficulty {
        config.chain.difficulty = difficulty;
    }
    for peer in &cli.peers {
        if !config.sync.seed_peers.contains(peer) {
            config.sync.seed_peers.push(peer.clone());
        }
    }

    // The miner flag may be a full address or a seed to derive one
    // from; unspecified, the reward goes to the address seeded by this
    // node's own URL.
    let miner_arg = cli.miner.clone().unwrap_or_else(|| self_url.clone());
    let miner_address = if could_be_valid_address(&miner_arg) {
        miner_arg
    } else {
        Keypair::from_seed(&miner_arg).address().to_string()
    };
    tracing::info!(%miner_address, "rewards will be credited to this address");

    // ---------------------------
    // On-disk state
    // ---------------------------

    let dirs = NodeDirs::new(&config.data.data_dir, port);
    dirs.create()
        .map_err(|e| format!("failed to create data directories: {e}"))?;

    // The local chain must validate before the node may serve or mine.
    let local_chain = TxChain::load(&dirs.chaindata());
    if !local_chain.is_valid(&config.chain) {
        return Err("local chain on disk failed validation; refusing to start".to_string());
    }
    tracing::info!(len = local_chain.len(), "local chain loaded");

    let mempool = MempoolStore::open(&dirs.file(&cli.db))
        .map_err(|e| format!("failed to open mempool database: {e}"))?;
    // The chain is re-derived from disk; confirmation pointers follow.
    mempool
        .unmark_all()
        .map_err(|e| format!("failed to reset mempool confirmations: {e}"))?;
    let mempool = Arc::new(Mutex::new(mempool));

    // ---------------------------
    // Shared state
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics: {e}"))?,
    );
    let peers = PeerSet::new(config.sync.peer_lease);
    let running = Arc::new(AtomicBool::new(true));

    let app_state: SharedState = Arc::new(AppState {
        config: config.clone(),
        dirs: dirs.clone(),
        peers: peers.clone(),
        mempool: mempool.clone(),
        metrics: metrics.clone(),
    });

    // ---------------------------
    // Mining thread
    // ---------------------------

    // The blocking peer clients and the loop itself live entirely on a
    // dedicated thread, away from the async runtime.
    let miner_handle = {
        let config = config.clone();
        let mempool = mempool.clone();
        let peers = peers.clone();
        let chain_dir = dirs.chaindata();
        let running = running.clone();
        let metrics = metrics.clone();
        let self_url = self_url.clone();

        std::thread::spawn(move || {
            let sync_client = match HttpPeerClient::new(config.sync.http_timeout) {
                Ok(client) => client,
                Err(err) => {
                    tracing::error!(%err, "failed to build peer client");
                    return;
                }
            };
            let gossip_client = match HttpPeerClient::new(config.sync.http_timeout) {
                Ok(client) => client,
                Err(err) => {
                    tracing::error!(%err, "failed to build peer client");
                    return;
                }
            };

            let mut miner: DefaultMinerLoop = MinerLoop::new(
                Synchronizer::new(sync_client, self_url.clone(), config.sync.seed_peers.clone()),
                BundleBuilder::new(
                    gossip_client,
                    mempool,
                    miner_address,
                    self_url,
                    config.chain.clone(),
                ),
                peers,
                chain_dir,
                config.chain.clone(),
                config.mining.clone(),
                running,
                metrics,
            );
            if let Err(err) = miner.run() {
                tracing::error!(%err, "mining loop aborted");
            }
        })
    };

    // ---------------------------
    // HTTP router
    // ---------------------------

    let mut app = Router::new()
        .route("/running", get(routes::chain::running))
        .route("/blockchain", get(routes::chain::blockchain))
        .route("/chainlength", get(routes::chain::chainlength))
        .route("/block", get(routes::chain::block))
        .route("/nodes", get(routes::peers::nodes))
        .route("/register", get(routes::peers::register))
        .route("/pushtx", put(routes::txs::pushtx))
        .route("/unprocessed", get(routes::txs::unprocessed))
        .route("/balance", get(routes::txs::balance))
        .route("/balances", get(routes::txs::balances))
        .route("/confirmations", get(routes::txs::confirmations));
    if config.metrics.enabled {
        app = app.route("/metrics", get(routes::metrics));
    }
    let app = app.with_state(app_state);

    tracing::info!("node listening on http://{self_url}");

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), port))
        .await
        .map_err(|e| format!("failed to bind {self_url}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server error: {e}"))?;

    // The mining loop checks the flag at the top of each iteration.
    running.store(false, Ordering::SeqCst);
    if miner_handle.join().is_err() {
        tracing::error!("mining thread panicked");
    }

    Ok(())
}

/// Waits for Ctrl-C, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
