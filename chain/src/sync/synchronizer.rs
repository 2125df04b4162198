//! Per-iteration peer refresh and longest-chain adoption.

use crate::blockchain::Chain;
use crate::config::ChainParams;

use super::client::PeerApi;
use super::peers::PeerSet;

/// Drives the network-facing half of a sync iteration.
///
/// The synchronizer never blocks the node on a single peer: every
/// outbound call is bounded by the client timeout, and a peer that fails
/// to answer is dropped from the live set for this iteration (it can
/// re-register at any time).
pub struct Synchronizer<P> {
    client: P,
    self_url: String,
    seed_peers: Vec<String>,
}

impl<P: PeerApi> Synchronizer<P> {
    pub fn new(client: P, self_url: impl Into<String>, seed_peers: Vec<String>) -> Self {
        Self {
            client,
            self_url: self_url.into(),
            seed_peers,
        }
    }

    /// Refreshes the live peer set.
    ///
    /// Candidates are the current live peers plus the seed list, minus
    /// this node itself. Each candidate is asked for its own node list;
    /// unreachable candidates are dropped. The union of everything
    /// learned (including the reachable candidates themselves) is then
    /// registered with: peers that accept our registration are upserted
    /// with a fresh timestamp, peers that do not are dropped.
    pub fn refresh_peers(&self, peers: &PeerSet) {
        let mut candidates: Vec<String> = peers.keys();
        for seed in &self.seed_peers {
            if !candidates.contains(seed) {
                candidates.push(seed.clone());
            }
        }
        candidates.retain(|url| *url != self.self_url);

        let mut discovered: Vec<String> = Vec::new();
        for candidate in &candidates {
            match self.client.nodes(candidate) {
                Ok(urls) => {
                    if !discovered.contains(candidate) {
                        discovered.push(candidate.clone());
                    }
                    for url in urls {
                        if !discovered.contains(&url) {
                            discovered.push(url);
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(peer = %candidate, %err, "peer unreachable, dropping");
                    peers.remove(candidate);
                }
            }
        }

        for peer in discovered {
            if peer == self.self_url {
                continue;
            }
            match self.client.register(&peer, &self.self_url) {
                Ok(()) => peers.upsert(&peer),
                Err(err) => {
                    tracing::debug!(peer = %peer, %err, "registration failed, dropping");
                    peers.remove(&peer);
                }
            }
        }
    }

    /// Looks for a strictly longer valid chain among the live peers.
    ///
    /// Peers that fail the liveness probe are dropped up front. The
    /// rest are asked for their chain length first; only a length
    /// strictly above the best seen so far is worth fetching. A fetched
    /// chain is adopted as the new candidate only if it parses,
    /// validates under `params` and is still strictly longer; ties keep
    /// the first-seen winner, and the incumbent local chain wins all
    /// ties by construction. Returns the winning remote chain, or `None`
    /// if the local one stands.
    pub fn adopt_longest<C: Chain>(
        &self,
        peers: &PeerSet,
        local: &C,
        params: &ChainParams,
    ) -> Option<C> {
        let mut best: Option<C> = None;
        let mut best_len = local.len();

        for peer in peers.keys() {
            if !self.client.running(&peer) {
                tracing::debug!(peer = %peer, "peer not running, dropping");
                peers.remove(&peer);
                continue;
            }
            let remote_len = match self.client.chain_length(&peer) {
                Ok(len) => len,
                Err(err) => {
                    tracing::debug!(peer = %peer, %err, "chain length query failed, dropping");
                    peers.remove(&peer);
                    continue;
                }
            };
            if remote_len as usize <= best_len {
                continue;
            }

            let body = match self.client.fetch_chain(&peer) {
                Ok(body) => body,
                Err(err) => {
                    tracing::debug!(peer = %peer, %err, "chain fetch failed, dropping");
                    peers.remove(&peer);
                    continue;
                }
            };
            let candidate = match C::from_json(&body) {
                Ok(chain) => chain,
                Err(err) => {
                    tracing::debug!(peer = %peer, %err, "peer sent malformed chain");
                    continue;
                }
            };
            if candidate.len() > best_len && candidate.is_valid(params) {
                tracing::debug!(peer = %peer, len = candidate.len(), "found longer valid chain");
                best_len = candidate.len();
                best = Some(candidate);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::BlockChain;
    use crate::config::MiningConfig;
    use crate::sync::client::PeerError;
    use crate::types::Transaction;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory stand-in for a set of remote nodes.
    #[derive(Default)]
    struct FakeNetwork {
        chains: HashMap<String, BlockChain>,
        node_lists: HashMap<String, Vec<String>>,
        registrations: Mutex<Vec<(String, String)>>,
    }

    impl FakeNetwork {
        fn with_chain(mut self, peer: &str, chain: BlockChain) -> Self {
            self.chains.insert(peer.to_string(), chain);
            self.node_lists.entry(peer.to_string()).or_default();
            self
        }

        fn with_nodes(mut self, peer: &str, nodes: &[&str]) -> Self {
            self.node_lists
                .insert(peer.to_string(), nodes.iter().map(|s| s.to_string()).collect());
            self
        }
    }

    impl PeerApi for &FakeNetwork {
        fn running(&self, peer: &str) -> bool {
            self.chains.contains_key(peer) || self.node_lists.contains_key(peer)
        }

        fn nodes(&self, peer: &str) -> Result<Vec<String>, PeerError> {
            self.node_lists
                .get(peer)
                .cloned()
                .ok_or_else(|| PeerError::Transport("connection refused".to_string()))
        }

        fn register(&self, peer: &str, self_url: &str) -> Result<(), PeerError> {
            if !self.running(peer) {
                return Err(PeerError::Transport("connection refused".to_string()));
            }
            self.registrations
                .lock()
                .expect("registrations lock")
                .push((peer.to_string(), self_url.to_string()));
            Ok(())
        }

        fn chain_length(&self, peer: &str) -> Result<u64, PeerError> {
            self.chains
                .get(peer)
                .map(|chain| chain.len() as u64)
                .ok_or_else(|| PeerError::Transport("connection refused".to_string()))
        }

        fn fetch_chain(&self, peer: &str) -> Result<String, PeerError> {
            self.chains
                .get(peer)
                .map(Chain::as_json)
                .ok_or_else(|| PeerError::Transport("connection refused".to_string()))
        }

        fn unprocessed(&self, _peer: &str) -> Result<Vec<Transaction>, PeerError> {
            Ok(Vec::new())
        }
    }

    fn params() -> ChainParams {
        ChainParams {
            difficulty: 0,
            ..ChainParams::default()
        }
    }

    fn mined_chain(len: usize) -> BlockChain {
        let mining = MiningConfig {
            intents: 1000,
            nonce_sleep: Duration::ZERO,
        };
        let mut chain = BlockChain::new();
        for _ in 0..len {
            let data = format!("Block #{}", chain.next_index());
            let block = chain.mine(&data, &params(), &mining).expect("difficulty 0");
            chain.append(block);
        }
        chain
    }

    #[test]
    fn longer_valid_peer_chain_is_adopted() {
        let remote = mined_chain(3);
        let network = FakeNetwork::default().with_chain("peer-a", remote.clone());
        let sync = Synchronizer::new(&network, "self:5000", vec![]);

        let peers = PeerSet::default();
        peers.upsert("peer-a");

        let local = mined_chain(1);
        let adopted = sync
            .adopt_longest(&peers, &local, &params())
            .expect("longer chain wins");
        assert_eq!(adopted, remote);
    }

    #[test]
    fn equal_length_chain_is_not_adopted() {
        let network = FakeNetwork::default().with_chain("peer-a", mined_chain(2));
        let sync = Synchronizer::new(&network, "self:5000", vec![]);

        let peers = PeerSet::default();
        peers.upsert("peer-a");

        let local = mined_chain(2);
        assert!(sync.adopt_longest(&peers, &local, &params()).is_none());
    }

    #[test]
    fn invalid_longer_chain_is_rejected() {
        let mut blocks = mined_chain(3).blocks().to_vec();
        blocks[1].data = "tampered".to_string();
        let network =
            FakeNetwork::default().with_chain("peer-a", BlockChain::from_blocks(blocks));
        let sync = Synchronizer::new(&network, "self:5000", vec![]);

        let peers = PeerSet::default();
        peers.upsert("peer-a");

        let local = mined_chain(1);
        assert!(sync.adopt_longest(&peers, &local, &params()).is_none());
        // The peer answered, so it stays in the set.
        assert!(peers.has("peer-a"));
    }

    #[test]
    fn dead_peer_is_dropped_during_adoption() {
        let network = FakeNetwork::default();
        let sync = Synchronizer::new(&network, "self:5000", vec![]);

        let peers = PeerSet::default();
        peers.upsert("peer-gone");

        let local = mined_chain(1);
        assert!(sync.adopt_longest(&peers, &local, &params()).is_none());
        assert!(!peers.has("peer-gone"));
    }

    #[test]
    fn adoption_converges_node_state_on_disk() {
        use tempfile::TempDir;

        // Two nodes share a genesis; the remote is two blocks ahead.
        let remote = mined_chain(3);
        let local = BlockChain::from_blocks(remote.blocks()[..1].to_vec());

        let network = FakeNetwork::default().with_chain("peer-x", remote.clone());
        let sync = Synchronizer::new(&network, "self:5000", vec![]);
        let peers = PeerSet::default();
        peers.upsert("peer-x");

        let adopted = sync
            .adopt_longest(&peers, &local, &params())
            .expect("remote chain wins");

        let tmp = TempDir::new().expect("create temp dir");
        adopted.save(tmp.path()).expect("persist adopted chain");
        let reloaded = BlockChain::load(tmp.path());
        assert_eq!(reloaded, remote);
    }

    #[test]
    fn refresh_discovers_and_registers_second_level_peers() {
        let network = FakeNetwork::default()
            .with_chain("peer-a", mined_chain(1))
            .with_nodes("peer-a", &["peer-b", "self:5000"])
            .with_chain("peer-b", mined_chain(1));
        let sync = Synchronizer::new(&network, "self:5000", vec!["peer-a".to_string()]);

        let peers = PeerSet::default();
        sync.refresh_peers(&peers);

        assert!(peers.has("peer-a"));
        assert!(peers.has("peer-b"));
        assert!(!peers.has("self:5000"));

        let registrations = network.registrations.lock().expect("registrations lock");
        assert!(registrations.contains(&("peer-a".to_string(), "self:5000".to_string())));
        assert!(registrations.contains(&("peer-b".to_string(), "self:5000".to_string())));
    }

    #[test]
    fn refresh_drops_unreachable_candidates() {
        let network = FakeNetwork::default().with_chain("peer-a", mined_chain(1));
        let sync = Synchronizer::new(&network, "self:5000", vec![]);

        let peers = PeerSet::default();
        peers.upsert("peer-a");
        peers.upsert("peer-dead");
        sync.refresh_peers(&peers);

        assert!(peers.has("peer-a"));
        assert!(!peers.has("peer-dead"));
    }
}
