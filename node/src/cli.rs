//! Command-line interface of the node binary.

use std::net::TcpListener;
use std::path::PathBuf;

use clap::Parser;

/// Run a mining currency node.
///
/// The node serves the wire API over HTTP while a background thread
/// mines new blocks and synchronizes with peers.
#[derive(Debug, Parser)]
#[command(name = "node")]
pub struct Cli {
    /// Host to bind the HTTP server to.
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on. When omitted, the first free port from 5000
    /// upward is used.
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Mempool database filename, stored inside the node's data
    /// directory.
    #[arg(short = 'd', long, default_value = "transactions.db")]
    pub db: String,

    /// Miner address receiving block rewards and fees, or a seed string
    /// to derive one from. Defaults to the seed "host:port".
    #[arg(short = 'm', long)]
    pub miner: Option<String>,

    /// Root directory for per-node state.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Proof-of-work difficulty: required leading zeros in block hashes.
    #[arg(long)]
    pub difficulty: Option<u32>,

    /// Additional peer URLs (host:port) appended to the seed list.
    pub peers: Vec<String>,
}

/// Whether a port can currently be bound on the given host.
pub fn port_is_free(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

/// Finds the first free port at or above 5000.
pub fn pick_free_port(host: &str) -> Option<u16> {
    (5000..u16::MAX).find(|port| port_is_free(host, *port))
}
