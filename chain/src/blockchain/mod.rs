//! Block chains and the shared chain interface.
//!
//! Two concrete chain flavours exist:
//!
//! - [`basic::BlockChain`]: structural validity only (indices, links,
//!   proof-of-work) with free-text block payloads,
//! - [`tx_chain::TxChain`]: payloads are transaction bundles, and
//!   validity additionally enforces signatures, uuid uniqueness and
//!   non-negative running balances.
//!
//! The mining loop and synchronizer are generic over the shared
//! [`Chain`] trait, so both flavours plug into the same machinery.

use std::fmt;
use std::path::Path;

use crate::config::{ChainParams, MiningConfig};
use crate::storage::{self, StorageError};
use crate::types::{Block, utc_timestamp};

pub mod basic;
pub mod tx_chain;

pub use basic::BlockChain;
pub use tx_chain::TxChain;

/// Errors surfaced by chain loading and the mining loop.
#[derive(Debug)]
pub enum ChainError {
    /// The locally persisted chain does not validate; the operator must
    /// intervene before the node may run.
    InvalidLocalChain,
    /// A chain could not be parsed from JSON.
    Parse(serde_json::Error),
    /// Underlying storage failure.
    Storage(StorageError),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidLocalChain => {
                write!(f, "local chain on disk failed validation; refusing to start")
            }
            ChainError::Parse(err) => write!(f, "malformed chain JSON: {err}"),
            ChainError::Storage(err) => write!(f, "chain storage error: {err}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Parse(err)
    }
}

impl From<StorageError> for ChainError {
    fn from(err: StorageError) -> Self {
        ChainError::Storage(err)
    }
}

/// The shared interface of every chain flavour.
///
/// Implementations own an ordered list of blocks rooted at genesis and
/// define what "valid" means for that list; everything else (length,
/// head, JSON forms, disk round-trips, mining) is provided on top.
pub trait Chain: Sized {
    /// Wraps an already-ordered list of blocks.
    fn from_blocks(blocks: Vec<Block>) -> Self;

    /// The blocks of this chain, genesis first.
    fn blocks(&self) -> &[Block];

    /// Extends the chain with a new block. Validity is not checked; the
    /// caller ensures the block is a valid successor.
    fn append(&mut self, block: Block);

    /// Full validity of the chain under the given parameters.
    fn is_valid(&self, params: &ChainParams) -> bool;

    fn len(&self) -> usize {
        self.blocks().len()
    }

    fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }

    /// The most recent block, if any.
    fn head(&self) -> Option<&Block> {
        self.blocks().last()
    }

    /// Index of the next block to mine.
    fn next_index(&self) -> u64 {
        match self.head() {
            Some(block) => block.index + 1,
            None => 0,
        }
    }

    /// Serializes the chain as a JSON array of block objects.
    fn as_json(&self) -> String {
        serde_json::to_string(self.blocks()).expect("blocks are always serializable to JSON")
    }

    /// Parses a chain from a JSON array of block objects.
    fn from_json(s: &str) -> Result<Self, ChainError> {
        let blocks: Vec<Block> = serde_json::from_str(s)?;
        Ok(Self::from_blocks(blocks))
    }

    /// Loads a chain from a block directory, skipping malformed files.
    fn load(dir: &Path) -> Self {
        Self::from_blocks(storage::load_blocks(dir))
    }

    /// Persists every block of this chain into `dir`. Filenames depend
    /// only on the index, so re-saving overwrites in place.
    fn save(&self, dir: &Path) -> Result<(), StorageError> {
        storage::save_blocks(dir, self.blocks())
    }

    /// Tries to mine the next block carrying `data`.
    ///
    /// Nonces `0..intents` are tried one at a time with a short sleep
    /// between attempts to yield CPU to the request handler. Because the
    /// timestamp is taken fresh per call, repeated calls explore
    /// different hash sequences even for the same nonces. Returns the
    /// first block satisfying the proof-of-work, or `None` once the
    /// attempts are exhausted.
    fn mine(&self, data: &str, params: &ChainParams, mining: &MiningConfig) -> Option<Block> {
        let prev_hash = match self.head() {
            Some(block) => block.compute_hash(),
            None => String::new(),
        };
        let mut block = Block {
            index: self.next_index(),
            timestamp: utc_timestamp(),
            prev_hash,
            data: data.to_string(),
            nonce: 0,
            hash: None,
        };
        for nonce in 0..mining.intents {
            block.nonce = u64::from(nonce);
            if block.satisfies_pow(params.difficulty) {
                block.hash = Some(block.compute_hash());
                return Some(block);
            }
            std::thread::sleep(mining.nonce_sleep);
        }
        None
    }
}

/// Structural validity shared by every chain flavour: the genesis block
/// has index 0, every block satisfies the proof-of-work, and every
/// adjacent pair is correctly linked. The empty chain is valid.
pub(crate) fn structurally_valid(blocks: &[Block], difficulty: u32) -> bool {
    match blocks.first() {
        None => return true,
        Some(genesis) if genesis.index != 0 => return false,
        Some(_) => {}
    }
    if !blocks.iter().all(|block| block.satisfies_pow(difficulty)) {
        return false;
    }
    blocks
        .windows(2)
        .all(|pair| Block::is_valid_successor(&pair[0], &pair[1]))
}

/// Confirmation count of a transaction: `chain_len - block_index` for
/// a transaction confirmed by the block at `block_index`, 0 for an
/// unconfirmed one.
pub fn confirmations(chain_len: u64, block_index: Option<u64>) -> u64 {
    match block_index {
        Some(index) => chain_len.saturating_sub(index),
        None => 0,
    }
}

/// Returns the smallest index at which two chains differ.
///
/// A missing block counts as a difference, so if one chain is a strict
/// prefix of the other the fork point is the shorter length, and equal
/// chains yield their common length. Returns `-1` when not even the
/// genesis block is shared.
pub fn fork_point(a: &[Block], b: &[Block]) -> i64 {
    let shared = a
        .iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .count();
    if shared == 0 && !a.is_empty() && !b.is_empty() {
        return -1;
    }
    shared as i64
}
