//! Outbound HTTP calls to peer nodes.
//!
//! The synchronizer talks to peers through the [`PeerApi`] trait so that
//! tests can substitute an in-memory fake; [`HttpPeerClient`] is the
//! real implementation using a blocking `reqwest` client with a bounded
//! timeout. Peer URLs are bare `host:port` strings; the scheme is added
//! here.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::types::Transaction;

/// Peer-communication error type.
#[derive(Debug)]
pub enum PeerError {
    /// Connection-level failure: refused, timed out, DNS, etc.
    Transport(String),
    /// The peer answered, but with something unparseable.
    Protocol(String),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::Transport(msg) => write!(f, "peer transport error: {msg}"),
            PeerError::Protocol(msg) => write!(f, "peer protocol error: {msg}"),
        }
    }
}

impl std::error::Error for PeerError {}

/// Abstract view of another node's wire API, as consumed by the
/// synchronizer and the bundle builder.
pub trait PeerApi {
    /// Whether the peer reports itself alive.
    fn running(&self, peer: &str) -> bool;

    /// The peer's list of known node URLs.
    fn nodes(&self, peer: &str) -> Result<Vec<String>, PeerError>;

    /// Registers `self_url` with the peer.
    fn register(&self, peer: &str, self_url: &str) -> Result<(), PeerError>;

    /// The number of blocks the peer has on disk.
    fn chain_length(&self, peer: &str) -> Result<u64, PeerError>;

    /// The peer's full chain as a JSON array of block objects.
    fn fetch_chain(&self, peer: &str) -> Result<String, PeerError>;

    /// The peer's unconfirmed transactions.
    fn unprocessed(&self, peer: &str) -> Result<Vec<Transaction>, PeerError>;
}

/// HTTP implementation of [`PeerApi`].
///
/// Uses the blocking `reqwest` client; the mining loop runs on its own
/// thread, so blocking here is fine and keeps the synchronizer free of
/// async plumbing.
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PeerError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn url(peer: &str, path: &str) -> String {
        format!(
            "http://{}/{}",
            peer.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn get_text(&self, peer: &str, path: &str) -> Result<String, PeerError> {
        let url = Self::url(peer, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| PeerError::Transport(format!("GET {url} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PeerError::Protocol(format!(
                "GET {url} returned HTTP status {status}"
            )));
        }
        resp.text()
            .map_err(|e| PeerError::Protocol(format!("failed to read body of {url}: {e}")))
    }
}

impl PeerApi for HttpPeerClient {
    fn running(&self, peer: &str) -> bool {
        matches!(self.get_text(peer, "running").as_deref(), Ok("running"))
    }

    fn nodes(&self, peer: &str) -> Result<Vec<String>, PeerError> {
        let body = self.get_text(peer, "nodes")?;
        serde_json::from_str(&body)
            .map_err(|e| PeerError::Protocol(format!("malformed node list: {e}")))
    }

    fn register(&self, peer: &str, self_url: &str) -> Result<(), PeerError> {
        let url = Self::url(peer, "register");
        let resp = self
            .client
            .get(&url)
            .query(&[("url", self_url)])
            .send()
            .map_err(|e| PeerError::Transport(format!("GET {url} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PeerError::Protocol(format!(
                "GET {url} returned HTTP status {status}"
            )));
        }
        Ok(())
    }

    fn chain_length(&self, peer: &str) -> Result<u64, PeerError> {
        let body = self.get_text(peer, "chainlength")?;
        body.trim()
            .parse()
            .map_err(|e| PeerError::Protocol(format!("malformed chain length {body:?}: {e}")))
    }

    fn fetch_chain(&self, peer: &str) -> Result<String, PeerError> {
        self.get_text(peer, "blockchain")
    }

    fn unprocessed(&self, peer: &str) -> Result<Vec<Transaction>, PeerError> {
        let body = self.get_text(peer, "unprocessed")?;
        serde_json::from_str(&body)
            .map_err(|e| PeerError::Protocol(format!("malformed transaction list: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() {
        assert_eq!(
            HttpPeerClient::url("localhost:5001", "nodes"),
            "http://localhost:5001/nodes"
        );
        assert_eq!(
            HttpPeerClient::url("localhost:5001/", "/nodes"),
            "http://localhost:5001/nodes"
        );
    }

    #[test]
    fn unreachable_peer_is_a_transport_error() {
        // Reserved TEST-NET address; nothing listens there.
        let client = HttpPeerClient::new(Duration::from_millis(200)).expect("build client");
        assert!(!client.running("192.0.2.1:1"));
        match client.nodes("192.0.2.1:1") {
            Err(PeerError::Transport(_)) => {}
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
