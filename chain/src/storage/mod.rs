//! On-disk storage for the chain.
//!
//! The chain directory is the serialization medium between the mining
//! loop (the only writer) and the request handlers (which re-read it per
//! request):
//!
//! - one JSON file per block, named `{index:06}.json`,
//! - per-node layout `{data_dir}/{port}/chaindata` managed by
//!   [`dir::NodeDirs`].
//!
//! Readers tolerate partially-written or malformed files by treating
//! them as absent.

pub mod dir;

pub use dir::{
    NodeDirs, StorageError, block_filename, chain_len_on_disk, load_blocks, save_block,
    save_blocks,
};
