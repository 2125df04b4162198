//! Block type and canonical hashing.
//!
//! A block is a positioned unit of chain extension: an index, the hash of
//! its predecessor, an opaque string payload, a timestamp and a
//! proof-of-work nonce. The canonical header string concatenates those
//! five fields; its SHA-256 digest is the block hash. The same canonical
//! form is used everywhere block identity matters, so it must not drift.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Returns the current UTC wall-clock time as an ISO-8601 string with
/// microsecond precision, e.g. `2026-08-01T12:34:56.123456`.
pub fn utc_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Computes the hex SHA-256 digest of the canonical block header.
///
/// The header is the plain concatenation
/// `{index}{prev_hash}{data}{timestamp}{nonce}` with `index` and `nonce`
/// in decimal. Hash stability across nodes is what makes proof-of-work
/// and chain linking verifiable, so this function is the single source
/// of truth for block identity.
pub fn calculate_hash(
    index: u64,
    prev_hash: &str,
    data: &str,
    timestamp: &str,
    nonce: u64,
) -> String {
    let header = format!("{index}{prev_hash}{data}{timestamp}{nonce}");
    hex::encode(Sha256::digest(header.as_bytes()))
}

/// One block of the chain.
///
/// The `hash` field is a cache of the last computed hash (filled in when
/// a block is mined); the true hash is always recomputed from the header
/// fields, so a stale or absent cache never affects validity.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Block {
    /// 0-based position in the chain.
    pub index: u64,

    /// ISO-8601 UTC timestamp of block creation.
    pub timestamp: String,

    /// Hex SHA-256 of the previous block's header, or the empty string
    /// for the genesis block.
    #[serde(default)]
    pub prev_hash: String,

    /// Opaque payload. For a currency chain this is a serialized
    /// transaction bundle; the block itself does not interpret it.
    pub data: String,

    /// Proof-of-work nonce.
    pub nonce: u64,

    /// Cached hash, if one was computed when the block was sealed.
    #[serde(default)]
    pub hash: Option<String>,
}

impl Block {
    /// Creates a block stamped with the current UTC time and no cached
    /// hash.
    pub fn new(index: u64, prev_hash: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            index,
            timestamp: utc_timestamp(),
            prev_hash: prev_hash.into(),
            data: data.into(),
            nonce: 0,
            hash: None,
        }
    }

    /// Recomputes this block's hash from the canonical header fields.
    pub fn compute_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.prev_hash,
            &self.data,
            &self.timestamp,
            self.nonce,
        )
    }

    /// Returns `true` iff the block hash carries at least `difficulty`
    /// leading ASCII `'0'` characters.
    pub fn satisfies_pow(&self, difficulty: u32) -> bool {
        let hash = self.compute_hash();
        hash.bytes().take_while(|b| *b == b'0').count() >= difficulty as usize
    }

    /// Returns `true` iff `next` directly extends `prev`: the index is
    /// incremented by one and `next.prev_hash` is the hash of `prev`.
    pub fn is_valid_successor(prev: &Block, next: &Block) -> bool {
        prev.index + 1 == next.index && prev.compute_hash() == next.prev_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            index: 0,
            timestamp: "2026-08-01T00:00:00.000000".to_string(),
            prev_hash: String::new(),
            data: "payload".to_string(),
            nonce: 7,
            hash: None,
        }
    }

    #[test]
    fn hash_depends_only_on_header_fields() {
        let block = sample_block();
        let h1 = block.compute_hash();
        let h2 = block.compute_hash();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        // A stale cache does not change the computed hash.
        let mut cached = block.clone();
        cached.hash = Some("deadbeef".to_string());
        assert_eq!(cached.compute_hash(), h1);
    }

    #[test]
    fn hash_is_stable_across_serde_roundtrip() {
        let block = sample_block();
        let json = serde_json::to_string(&block).expect("block encodes");
        let back: Block = serde_json::from_str(&json).expect("block decodes");
        assert_eq!(back, block);
        assert_eq!(back.compute_hash(), block.compute_hash());
    }

    #[test]
    fn every_header_field_changes_the_hash() {
        let base = sample_block();
        let reference = base.compute_hash();

        let mut altered = base.clone();
        altered.index = 1;
        assert_ne!(altered.compute_hash(), reference);

        let mut altered = base.clone();
        altered.timestamp.push('1');
        assert_ne!(altered.compute_hash(), reference);

        let mut altered = base.clone();
        altered.prev_hash = "00".to_string();
        assert_ne!(altered.compute_hash(), reference);

        let mut altered = base.clone();
        altered.data.push('x');
        assert_ne!(altered.compute_hash(), reference);

        let mut altered = base.clone();
        altered.nonce += 1;
        assert_ne!(altered.compute_hash(), reference);
    }

    #[test]
    fn pow_counts_leading_zeros() {
        let block = sample_block();
        assert!(block.satisfies_pow(0));

        let zeros = block.compute_hash().bytes().take_while(|b| *b == b'0').count() as u32;
        assert!(block.satisfies_pow(zeros));
        assert!(!block.satisfies_pow(zeros + 1));
    }

    #[test]
    fn successor_linking_checks_index_and_hash() {
        let genesis = sample_block();
        let mut next = Block::new(1, genesis.compute_hash(), "more");
        assert!(Block::is_valid_successor(&genesis, &next));

        next.index = 2;
        assert!(!Block::is_valid_successor(&genesis, &next));
        next.index = 1;

        // Tampering with any predecessor field breaks the link.
        let mut tampered = genesis.clone();
        tampered.timestamp = tampered.timestamp.replace('0', "1");
        assert!(!Block::is_valid_successor(&tampered, &next));
    }
}
