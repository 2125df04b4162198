//! Construction of the next block's payload.
//!
//! The mining loop does not care what goes into a block; it asks a
//! [`PayloadBuilder`] for the payload string and mines over it. The
//! plain chain uses a simple label; the currency chain gossips and
//! reconciles the mempool, then packages a fee-ordered bundle of
//! affordable transactions.

use std::sync::{Arc, Mutex};

use crate::blockchain::{Chain, TxChain};
use crate::config::ChainParams;
use crate::mempool::{MempoolStore, StoreError};
use crate::types::{Transaction, TransactionBundle};

use super::client::PeerApi;
use super::peers::PeerSet;

/// Produces the payload for the next block to mine on top of `chain`.
pub trait PayloadBuilder<C: Chain> {
    fn next_payload(&mut self, chain: &C, peers: &PeerSet) -> String;
}

/// Payload for chains without transaction semantics: a plain label
/// naming the block.
#[derive(Clone, Copy, Debug, Default)]
pub struct LabelPayload;

impl<C: Chain> PayloadBuilder<C> for LabelPayload {
    fn next_payload(&mut self, chain: &C, _peers: &PeerSet) -> String {
        format!("Block #{}", chain.next_index())
    }
}

/// Builds transaction bundles from the mempool.
///
/// One call runs the mempool half of a sync iteration: gossip
/// unprocessed transactions in from every live peer, reconcile the
/// store against the chain, then greedily select the highest-fee
/// transactions whose senders can still afford them.
pub struct BundleBuilder<P> {
    client: P,
    mempool: Arc<Mutex<MempoolStore>>,
    miner_address: String,
    self_url: String,
    params: ChainParams,
}

impl<P: PeerApi> BundleBuilder<P> {
    pub fn new(
        client: P,
        mempool: Arc<Mutex<MempoolStore>>,
        miner_address: impl Into<String>,
        self_url: impl Into<String>,
        params: ChainParams,
    ) -> Self {
        Self {
            client,
            mempool,
            miner_address: miner_address.into(),
            self_url: self_url.into(),
            params,
        }
    }

    /// Pulls unprocessed transactions from every live peer into the
    /// local store.
    ///
    /// Gossiped transactions are inserted as-is without re-validation;
    /// signatures are checked again when a bundle is built, so an
    /// invalid transaction can sit in the store but never enters a
    /// block.
    fn gossip(&self, peers: &PeerSet) {
        for peer in peers.keys() {
            let txs = match self.client.unprocessed(&peer) {
                Ok(txs) => txs,
                Err(err) => {
                    tracing::debug!(peer = %peer, %err, "gossip fetch failed, dropping peer");
                    peers.remove(&peer);
                    continue;
                }
            };
            let store = self.store();
            for tx in txs {
                if let Err(err) = store.insert_if_absent(&tx) {
                    tracing::warn!(uuid = %tx.uuid, %err, "failed to store gossiped transaction");
                }
            }
        }
    }

    /// Re-derives every confirmation pointer from the chain.
    ///
    /// All rows are reset to unprocessed, then every transaction found
    /// in a block is inserted if missing (transactions can reach us
    /// only inside a block) and marked with its block index. Running
    /// this twice on the same chain is a no-op the second time.
    fn reconcile(&self, chain: &TxChain) -> Result<(), StoreError> {
        let store = self.store();
        store.unmark_all()?;
        for block in chain.blocks() {
            let Ok(bundle) = TransactionBundle::from_payload(&block.data) else {
                continue;
            };
            for tx in &bundle.transactions {
                store.insert_if_absent(tx)?;
                store.mark(&tx.uuid, block.index)?;
            }
        }
        Ok(())
    }

    /// Selects the next block's transactions, highest fee first.
    ///
    /// Starting from the confirmed balances, a transaction is admitted
    /// only if it is well-formed and its sender can still cover
    /// `amount + fee` after the transactions admitted before it.
    /// Unaffordable transactions are skipped, not dropped: they stay
    /// unprocessed and get another chance once funds arrive.
    fn build_bundle(&self, chain: &TxChain) -> Result<TransactionBundle, StoreError> {
        let candidates = self.store().unprocessed_by_fee()?;
        let mut balances = chain.get_balances(&self.params, 1);
        let mut selected: Vec<Transaction> = Vec::new();

        for tx in candidates {
            if selected.len() >= self.params.max_block_txs {
                break;
            }
            if !tx.is_valid() {
                continue;
            }
            let available = balances
                .get(&tx.from_addr)
                .copied()
                .unwrap_or(self.params.new_address_balance);
            let cost = tx.amount + tx.fee;
            if available < cost {
                continue;
            }
            balances.insert(tx.from_addr.clone(), available - cost);
            *balances
                .entry(tx.to_addr.clone())
                .or_insert(self.params.new_address_balance) += tx.amount;
            selected.push(tx);
        }

        Ok(TransactionBundle::new(
            format!("Mined by {}", self.self_url),
            self.miner_address.clone(),
            selected,
        ))
    }

    fn store(&self) -> std::sync::MutexGuard<'_, MempoolStore> {
        self.mempool.lock().expect("mempool lock poisoned")
    }
}

impl<P: PeerApi> PayloadBuilder<TxChain> for BundleBuilder<P> {
    fn next_payload(&mut self, chain: &TxChain, peers: &PeerSet) -> String {
        self.gossip(peers);
        if let Err(err) = self.reconcile(chain) {
            tracing::warn!(%err, "mempool reconciliation failed");
        }
        match self.build_bundle(chain) {
            Ok(bundle) => bundle.to_payload(),
            Err(err) => {
                tracing::warn!(%err, "bundle construction failed, mining an empty bundle");
                TransactionBundle::new(
                    format!("Mined by {}", self.self_url),
                    self.miner_address.clone(),
                    Vec::new(),
                )
                .to_payload()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::sync::client::PeerError;
    use crate::types::{Amount, Block, utc_timestamp};

    /// Peer fake that serves a fixed list of unprocessed transactions.
    struct GossipPeer {
        txs: Vec<Transaction>,
    }

    impl PeerApi for &GossipPeer {
        fn running(&self, _peer: &str) -> bool {
            true
        }

        fn nodes(&self, _peer: &str) -> Result<Vec<String>, PeerError> {
            Ok(Vec::new())
        }

        fn register(&self, _peer: &str, _self_url: &str) -> Result<(), PeerError> {
            Ok(())
        }

        fn chain_length(&self, _peer: &str) -> Result<u64, PeerError> {
            Ok(0)
        }

        fn fetch_chain(&self, _peer: &str) -> Result<String, PeerError> {
            Ok("[]".to_string())
        }

        fn unprocessed(&self, _peer: &str) -> Result<Vec<Transaction>, PeerError> {
            Ok(self.txs.clone())
        }
    }

    fn params() -> ChainParams {
        ChainParams {
            difficulty: 0,
            ..ChainParams::default()
        }
    }

    fn shared_store() -> Arc<Mutex<MempoolStore>> {
        Arc::new(Mutex::new(
            MempoolStore::open_in_memory().expect("open store"),
        ))
    }

    fn signed(from: &Keypair, to: &str, amount: f64, fee: f64) -> Transaction {
        let mut tx = Transaction::new(
            from.address(),
            to,
            Amount::from_f64(amount),
            Amount::from_f64(fee),
            "payload test",
        );
        tx.sign(from);
        tx
    }

    fn builder<'a>(
        peer: &'a GossipPeer,
        mempool: Arc<Mutex<MempoolStore>>,
    ) -> BundleBuilder<&'a GossipPeer> {
        BundleBuilder::new(peer, mempool, "miner-address", "self:5000", params())
    }

    fn chain_with_bundle(bundle: &TransactionBundle) -> TxChain {
        let mut chain = TxChain::new();
        chain.append(Block {
            index: 0,
            timestamp: utc_timestamp(),
            prev_hash: String::new(),
            data: bundle.to_payload(),
            nonce: 0,
            hash: None,
        });
        chain
    }

    #[test]
    fn gossiped_transactions_land_once_in_the_store() {
        let alice = Keypair::from_seed("0");
        let tx = signed(&alice, "bob", 0.2, 0.01);
        let peer = GossipPeer {
            txs: vec![tx.clone(), tx.clone()],
        };
        let mempool = shared_store();
        let mut builder = builder(&peer, mempool.clone());

        let peers = PeerSet::default();
        peers.upsert("peer-a");

        let chain = TxChain::new();
        builder.next_payload(&chain, &peers);
        builder.next_payload(&chain, &peers);

        let store = mempool.lock().expect("lock");
        assert_eq!(store.unprocessed().expect("unprocessed").len(), 1);
    }

    #[test]
    fn reconcile_is_idempotent_and_learns_block_transactions() {
        let alice = Keypair::from_seed("0");
        let tx = signed(&alice, "bob", 0.2, 0.01);
        let bundle = TransactionBundle::new("b0", "miner", vec![tx.clone()]);
        let chain = chain_with_bundle(&bundle);

        let peer = GossipPeer { txs: Vec::new() };
        let mempool = shared_store();
        let builder = builder(&peer, mempool.clone());

        // The transaction is unknown locally; reconciliation adds and
        // marks it.
        builder.reconcile(&chain).expect("first reconcile");
        builder.reconcile(&chain).expect("second reconcile");

        let store = mempool.lock().expect("lock");
        assert_eq!(store.block_index(&tx.uuid).expect("index"), Some(0));
        assert!(store.unprocessed().expect("unprocessed").is_empty());
    }

    #[test]
    fn bundle_selects_by_fee_and_affordability() {
        let rich = Keypair::from_seed("rich");
        let poor = Keypair::from_seed("poor");

        // poor has only the starting balance of 1 and cannot afford a
        // 1.0 transfer plus fee; rich can afford a 0.5 transfer.
        let unaffordable = signed(&poor, "bob", 1.0, 0.05);
        let affordable = signed(&rich, "bob", 0.5, 0.01);

        let peer = GossipPeer { txs: Vec::new() };
        let mempool = shared_store();
        {
            let store = mempool.lock().expect("lock");
            store.insert_if_absent(&unaffordable).expect("insert");
            store.insert_if_absent(&affordable).expect("insert");
        }
        let builder = builder(&peer, mempool.clone());

        let chain = TxChain::new();
        let bundle = builder.build_bundle(&chain).expect("build");
        let uuids: Vec<&str> = bundle
            .transactions
            .iter()
            .map(|tx| tx.uuid.as_str())
            .collect();
        assert_eq!(uuids, vec![affordable.uuid.as_str()]);

        // The unaffordable transaction stays unprocessed.
        let store = mempool.lock().expect("lock");
        assert!(store
            .unprocessed()
            .expect("unprocessed")
            .iter()
            .any(|tx| tx.uuid == unaffordable.uuid));
    }

    #[test]
    fn bundle_respects_the_block_transaction_cap() {
        let peer = GossipPeer { txs: Vec::new() };
        let mempool = shared_store();
        {
            let store = mempool.lock().expect("lock");
            for i in 0..10 {
                let sender = Keypair::from_seed(&format!("sender-{i}"));
                store
                    .insert_if_absent(&signed(&sender, "bob", 0.1, 0.01))
                    .expect("insert");
            }
        }
        let builder = builder(&peer, mempool);

        let bundle = builder.build_bundle(&TxChain::new()).expect("build");
        assert_eq!(bundle.transactions.len(), params().max_block_txs);
    }

    #[test]
    fn invalid_transactions_never_enter_a_bundle() {
        let alice = Keypair::from_seed("0");
        let mut forged = signed(&alice, "bob", 0.1, 0.01);
        forged.amount = Amount::from_f64(0.2);

        let peer = GossipPeer { txs: Vec::new() };
        let mempool = shared_store();
        mempool
            .lock()
            .expect("lock")
            .insert_if_absent(&forged)
            .expect("insert");
        let builder = builder(&peer, mempool);

        let bundle = builder.build_bundle(&TxChain::new()).expect("build");
        assert!(bundle.transactions.is_empty());
    }

    #[test]
    fn sender_budget_is_tracked_across_selections() {
        let alice = Keypair::from_seed("0");
        // Each costs 0.45; the starting balance of 1 affords two.
        let txs: Vec<Transaction> = (0..3).map(|_| signed(&alice, "bob", 0.4, 0.05)).collect();

        let peer = GossipPeer { txs: Vec::new() };
        let mempool = shared_store();
        {
            let store = mempool.lock().expect("lock");
            for tx in &txs {
                store.insert_if_absent(tx).expect("insert");
            }
        }
        let builder = builder(&peer, mempool);

        let bundle = builder.build_bundle(&TxChain::new()).expect("build");
        assert_eq!(bundle.transactions.len(), 2);
    }

    #[test]
    fn payload_labels_the_mining_node() {
        let peer = GossipPeer { txs: Vec::new() };
        let mut builder = builder(&peer, shared_store());
        let payload = builder.next_payload(&TxChain::new(), &PeerSet::default());
        let bundle = TransactionBundle::from_payload(&payload).expect("bundle parses");
        assert_eq!(bundle.msg, "Mined by self:5000");
        assert_eq!(bundle.miner_address, "miner-address");
        assert!(bundle.transactions.is_empty());
    }
}
