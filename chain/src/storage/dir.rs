//! File-backed block storage and the per-node directory layout.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Block;

/// Storage-level error type.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying filesystem error.
    Io(std::io::Error),
    /// A block could not be serialized.
    Serialize(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "storage I/O error: {err}"),
            StorageError::Serialize(err) => write!(f, "block serialization error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialize(err)
    }
}

/// Per-node directory layout under a shared data root.
///
/// Every node keeps its state under `{data_dir}/{port}/`: block files in
/// the `chaindata` subdirectory, the mempool database file next to it.
/// Using the port keeps several nodes on one machine from clobbering
/// each other.
#[derive(Clone, Debug)]
pub struct NodeDirs {
    root: PathBuf,
}

impl NodeDirs {
    pub fn new(data_dir: &Path, port: u16) -> Self {
        Self {
            root: data_dir.join(port.to_string()),
        }
    }

    /// Creates the node's directories if missing.
    pub fn create(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.chaindata())?;
        Ok(())
    }

    /// Directory holding one JSON file per block.
    pub fn chaindata(&self) -> PathBuf {
        self.root.join("chaindata")
    }

    /// Path of a file stored next to the chain data (e.g. the mempool
    /// database).
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// The filename a block is stored under; depends only on the index, so
/// re-saving a block overwrites in place.
pub fn block_filename(index: u64) -> String {
    format!("{index:06}.json")
}

/// Loads all parseable blocks from a chain directory, sorted by index.
///
/// A missing directory yields an empty list. Files that fail to read or
/// parse are skipped: a partially-written block is treated as absent
/// until its writer finishes.
pub fn load_blocks(dir: &Path) -> Vec<Block> {
    let mut blocks = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return blocks;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Ok(contents) = fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<Block>(&contents) {
            Ok(block) => blocks.push(block),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping malformed block file");
            }
        }
    }
    blocks.sort_by_key(|block| block.index);
    blocks
}

/// Persists a single block into the chain directory.
pub fn save_block(dir: &Path, block: &Block) -> Result<(), StorageError> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string(block)?;
    fs::write(dir.join(block_filename(block.index)), json)?;
    Ok(())
}

/// Persists every block; last writer wins per index.
pub fn save_blocks(dir: &Path, blocks: &[Block]) -> Result<(), StorageError> {
    for block in blocks {
        save_block(dir, block)?;
    }
    Ok(())
}

/// Number of blocks on disk, i.e. the count of `*.json` files.
pub fn chain_len_on_disk(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .count() as u64
}
