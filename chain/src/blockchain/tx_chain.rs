//! Transaction-aware block chain with balance accounting.

use std::collections::{HashMap, HashSet};

use crate::config::ChainParams;
use crate::types::{Amount, Block, TransactionBundle};

use super::{Chain, structurally_valid};

/// A chain whose block payloads are serialized transaction bundles.
///
/// On top of the structural rules this enforces the currency rules:
/// every bundle parses and is well-formed, no transaction uuid appears
/// twice anywhere in the chain, and no address balance ever drops below
/// zero at any prefix of the chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TxChain {
    blocks: Vec<Block>,
}

impl TxChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the balance of every address seen in the chain, counting
    /// only blocks with at least `confirmations` confirmations.
    ///
    /// A block at index `i` of a length-`L` chain has `L - i`
    /// confirmations, so the default of 1 covers every mined block while
    /// e.g. 2 excludes the head. Addresses appear with their implicit
    /// starting balance already folded in.
    pub fn get_balances(
        &self,
        params: &ChainParams,
        confirmations: u32,
    ) -> HashMap<String, Amount> {
        let mut balances: HashMap<String, Amount> = HashMap::new();
        let len = self.blocks.len() as u64;
        for block in &self.blocks {
            // Block i of a length-L chain has L - i confirmations.
            if block.index + u64::from(confirmations) > len {
                break;
            }
            let Ok(bundle) = TransactionBundle::from_payload(&block.data) else {
                continue;
            };
            apply_bundle(&mut balances, &bundle, params);
        }
        balances
    }

    /// The balance of a single address; `NEW_ADDRESS_BALANCE` semantics
    /// apply to addresses the chain has never seen.
    pub fn get_balance(&self, params: &ChainParams, address: &str, confirmations: u32) -> Amount {
        self.get_balances(params, confirmations)
            .remove(address)
            .unwrap_or(params.new_address_balance)
    }

    /// Currency-level validity: parsable well-formed bundles, globally
    /// unique transaction uuids, and non-negative running balances.
    fn transactions_valid(&self, params: &ChainParams) -> bool {
        let mut seen: HashSet<String> = HashSet::new();
        let mut balances: HashMap<String, Amount> = HashMap::new();
        for block in &self.blocks {
            let Ok(bundle) = TransactionBundle::from_payload(&block.data) else {
                return false;
            };
            if !bundle.is_valid() {
                return false;
            }
            for tx in &bundle.transactions {
                if !seen.insert(tx.uuid.clone()) {
                    return false;
                }
            }
            apply_bundle(&mut balances, &bundle, params);
            if balances.values().any(|balance| balance.is_negative()) {
                return false;
            }
        }
        true
    }
}

/// Applies one block's bundle to a balance map: each transaction debits
/// the sender by `amount + fee`, credits the recipient with `amount`
/// and the miner with `fee`; the miner then collects the block reward.
fn apply_bundle(
    balances: &mut HashMap<String, Amount>,
    bundle: &TransactionBundle,
    params: &ChainParams,
) {
    let initial = params.new_address_balance;
    for tx in &bundle.transactions {
        *balances.entry(tx.from_addr.clone()).or_insert(initial) -= tx.amount + tx.fee;
        *balances.entry(tx.to_addr.clone()).or_insert(initial) += tx.amount;
        *balances.entry(bundle.miner_address.clone()).or_insert(initial) += tx.fee;
    }
    *balances.entry(bundle.miner_address.clone()).or_insert(initial) += params.block_reward;
}

impl Chain for TxChain {
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
        structurally_valid(&self.blocks, params.difficulty) && self.transactions_valid(params)
    }
}
