//! The live set of known peers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Thread-safe map from peer URL (`host:port`) to the last time the
/// peer was successfully contacted or registered itself.
///
/// Both the request handler (the `/register` endpoint) and the mining
/// loop (peer refresh) mutate the set concurrently; all operations are
/// atomic per key. Entries whose lease has lapsed are pruned lazily
/// whenever the set is listed.
#[derive(Clone, Debug)]
pub struct PeerSet {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
    lease: Duration,
}

impl PeerSet {
    pub fn new(lease: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            lease,
        }
    }

    /// Inserts or refreshes a peer, stamping it with the current time.
    /// Last write wins.
    pub fn upsert(&self, url: &str) {
        let mut peers = self.inner.lock().expect("peer set lock poisoned");
        peers.insert(url.to_string(), Instant::now());
    }

    /// Drops a peer, typically after a failed connection.
    pub fn remove(&self, url: &str) {
        let mut peers = self.inner.lock().expect("peer set lock poisoned");
        peers.remove(url);
    }

    /// Lists the live peers, pruning any whose lease has expired.
    pub fn keys(&self) -> Vec<String> {
        let mut peers = self.inner.lock().expect("peer set lock poisoned");
        let now = Instant::now();
        peers.retain(|_, seen| now.duration_since(*seen) < self.lease);
        peers.keys().cloned().collect()
    }

    pub fn has(&self, url: &str) -> bool {
        let peers = self.inner.lock().expect("peer set lock poisoned");
        peers.contains_key(url)
    }

    pub fn len(&self) -> usize {
        let peers = self.inner.lock().expect("peer set lock poisoned");
        peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PeerSet {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_and_remove_track_membership() {
        let peers = PeerSet::default();
        assert!(peers.is_empty());

        peers.upsert("localhost:5001");
        peers.upsert("localhost:5002");
        peers.upsert("localhost:5001");
        assert_eq!(peers.len(), 2);
        assert!(peers.has("localhost:5001"));

        peers.remove("localhost:5001");
        assert!(!peers.has("localhost:5001"));
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn listing_prunes_expired_leases() {
        let peers = PeerSet::new(Duration::ZERO);
        peers.upsert("localhost:5001");
        // A zero lease expires immediately.
        assert!(peers.keys().is_empty());
        assert!(!peers.has("localhost:5001"));
    }

    #[test]
    fn concurrent_mutation_is_safe() {
        let peers = PeerSet::default();
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let peers = peers.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        peers.upsert(&format!("localhost:{}", 5000 + (i * 50 + j) % 100));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer thread");
        }
        assert_eq!(peers.len(), 100);
    }
}
