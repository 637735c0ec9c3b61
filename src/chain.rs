//! The block list: creation, validation, linking and integrity walks.
//!
//! Blocks live in a `Vec` indexed by block number; the latest block is
//! always the last element, so there is no separate tail reference that could
//! go stale across a restore.

use tracing::{debug, warn};
use crate::{
    block::{self, Block, Token},
    error::{LedgerError, Result},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Blockchain {
    blocks: Vec<Block>,
    token: Token,
}

impl Blockchain {
    /// A fresh chain holding only a genesis block stamped `timestamp`.
    pub fn with_genesis(token: Token, reward: u64, timestamp: String) -> Self {
        Blockchain { blocks: vec![Block::genesis(timestamp, reward)], token }
    }

    /// Rebuilds a chain from blocks in genesis-to-latest order.
    /// Returns `None` for an empty block list.
    pub fn from_blocks(token: Token, blocks: Vec<Block>) -> Option<Self> {
        if blocks.is_empty() {
            return None;
        }
        Some(Blockchain { blocks, token })
    }

    pub fn token(&self) -> &Token { &self.token }

    pub fn blocks(&self) -> &[Block] { &self.blocks }

    pub fn block_count(&self) -> usize { self.blocks.len() }

    pub fn genesis(&self) -> &Block { &self.blocks[0] }

    pub fn latest(&self) -> &Block {
        // never empty: both constructors guarantee a genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Builds the next block on top of `latest`, stamped now. Not linked.
    pub fn create_block(&self, reward: u64) -> Block {
        self.create_block_at(block::now_timestamp(), reward)
    }

    pub fn create_block_at(&self, timestamp: String, reward: u64) -> Block {
        let latest = self.latest();
        Block::candidate(latest.index + 1, &latest.current_hash, timestamp, reward)
    }

    /// Checks that `candidate` extends `latest` and that its header hash is
    /// the recomputation of its fields. Never mutates the chain.
    pub fn validate_block(&self, candidate: &Block) -> Result<()> {
        let expected = &self.latest().current_hash;
        if &candidate.previous_hash != expected {
            warn!(index = candidate.index, "previous hash mismatch");
            return Err(LedgerError::PreviousHashMismatch {
                expected: expected.clone(),
                found: candidate.previous_hash.clone(),
            });
        }
        let computed = candidate.recompute_hash();
        if computed != candidate.current_hash {
            warn!(index = candidate.index, "block hash mismatch");
            return Err(LedgerError::HashMismatch {
                computed,
                stored: candidate.current_hash.clone(),
            });
        }
        debug!(index = candidate.index, "block validated");
        Ok(())
    }

    /// Validates and appends `block`, making it the new latest block.
    pub fn link(&mut self, block: Block) -> Result<()> {
        self.validate_block(&block)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Walks genesis→latest checking every stored hash, every transaction
    /// digest and every back-link. Stops at the first fault.
    pub fn validate_integrity(&self) -> bool {
        match self.first_fault() {
            None => true,
            Some(index) => {
                warn!(index, "chain integrity check failed");
                false
            }
        }
    }

    fn first_fault(&self) -> Option<u64> {
        for (i, current) in self.blocks.iter().enumerate() {
            if !current.has_valid_hash() || !current.has_valid_tx_digest() {
                return Some(current.index);
            }
            if let Some(next) = self.blocks.get(i + 1) {
                if next.previous_hash != current.current_hash {
                    return Some(next.index);
                }
            }
        }
        None
    }
}
