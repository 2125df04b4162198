//! The mining loop.
//!
//! A node's second flow of control next to the request handler: an
//! infinite loop that synchronizes with the network, asks the payload
//! builder for the next block's contents and grinds nonces over it.
//! The loop owns the chain in memory and is the only writer of the
//! chain directory; request handlers observe its progress by re-reading
//! the directory.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::blockchain::{Chain, ChainError};
use crate::config::{ChainParams, MiningConfig};
use crate::metrics::MetricsRegistry;
use crate::sync::{PayloadBuilder, PeerApi, PeerSet, Synchronizer};

/// Drives mining iterations until the shared `running` flag clears.
pub struct MinerLoop<C, P, B> {
    sync: Synchronizer<P>,
    payload: B,
    peers: PeerSet,
    chain_dir: PathBuf,
    params: ChainParams,
    mining: MiningConfig,
    running: Arc<AtomicBool>,
    metrics: Arc<MetricsRegistry>,
    _chain: PhantomData<C>,
}

impl<C, P, B> MinerLoop<C, P, B>
where
    C: Chain,
    P: PeerApi,
    B: PayloadBuilder<C>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sync: Synchronizer<P>,
        payload: B,
        peers: PeerSet,
        chain_dir: PathBuf,
        params: ChainParams,
        mining: MiningConfig,
        running: Arc<AtomicBool>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            sync,
            payload,
            peers,
            chain_dir,
            params,
            mining,
            running,
            metrics,
            _chain: PhantomData,
        }
    }

    /// Runs the loop to completion.
    ///
    /// The chain is loaded from disk up front and must validate; a node
    /// with a corrupt local chain refuses to run so the operator can
    /// intervene. Each iteration then refreshes peers, adopts a longer
    /// valid chain if one is offered, builds the next payload and tries
    /// to mine it. A successfully mined block is appended and the whole
    /// chain persisted (re-saving rewrites files in place, so an
    /// earlier failed write heals on the next success).
    pub fn run(&mut self) -> Result<(), ChainError> {
        let mut chain = C::load(&self.chain_dir);
        if !chain.is_valid(&self.params) {
            return Err(ChainError::InvalidLocalChain);
        }
        tracing::info!(len = chain.len(), "mining loop starting");

        while self.running.load(Ordering::SeqCst) {
            let sync_started = Instant::now();
            self.sync.refresh_peers(&self.peers);

            if let Some(adopted) = self.sync.adopt_longest(&self.peers, &chain, &self.params) {
                chain = adopted;
                if let Err(err) = chain.save(&self.chain_dir) {
                    tracing::warn!(%err, "failed to persist adopted chain");
                }
                self.metrics.node.chains_adopted.inc();
                tracing::info!(len = chain.len(), "adopted longer chain from peer");
            }

            let data = self.payload.next_payload(&chain, &self.peers);
            self.metrics
                .node
                .sync_seconds
                .observe(sync_started.elapsed().as_secs_f64());

            let mine_started = Instant::now();
            let mined = chain.mine(&data, &self.params, &self.mining);
            self.metrics
                .node
                .mine_seconds
                .observe(mine_started.elapsed().as_secs_f64());

            if let Some(block) = mined {
                tracing::info!(
                    index = block.index,
                    hash = %block.compute_hash(),
                    "mined new block"
                );
                chain.append(block);
                if let Err(err) = chain.save(&self.chain_dir) {
                    tracing::warn!(%err, "failed to persist mined block");
                }
                self.metrics.node.blocks_mined.inc();
            }
        }

        tracing::info!("mining loop stopped");
        Ok(())
    }
}
