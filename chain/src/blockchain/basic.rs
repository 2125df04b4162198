//! Plain block chain with free-text payloads.

use crate::config::ChainParams;
use crate::types::Block;

use super::{Chain, structurally_valid};

/// A chain whose blocks carry opaque string payloads.
///
/// Validity is purely structural; there is no notion of transactions or
/// balances. Useful for exercising the mining and synchronization
/// machinery in isolation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockChain {
    blocks: Vec<Block>,
}

impl BlockChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Chain for BlockChain {
    fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    fn is_valid(&self, params: &ChainParams) -> bool {
        structurally_valid(&self.blocks, params.difficulty)
    }
}
