// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;

use mesh_blocks::Block;
use tracing::{debug, warn};

use crate::errors::LedgerError;

/// In-memory, ordered chain of blocks, guarded by a single coarse-grained
/// mutex. Appends, inserts and copy-outs all take the lock for the duration
/// of the operation; traversal borrows it for the duration of a closure so
/// callers can never hold a reference across the lock's lifetime.
#[derive(Default)]
pub struct LedgerStore {
    chain: Mutex<Vec<Block>>,
}

impl LedgerStore {
    /// Allocates an empty ledger. Idempotent with [`LedgerStore::deinit`].
    pub fn init() -> Self {
        Self::default()
    }

    /// Releases every block and resets the store to empty.
    pub fn deinit(&self) {
        let mut chain = self.chain.lock().unwrap();
        let dropped = chain.len();
        chain.clear();
        debug!(dropped, "ledger deinitialized");
    }

    /// Places `block` at the tail, overriding its `block_num` to
    /// `tail.block_num + 1` (or `0` on an empty store, anchoring genesis
    /// locally regardless of what the caller set). This is the operation the
    /// round engine's leader path uses to seal a freshly-built block — by the
    /// time it's called, `block_num` has already been set from
    /// [`LedgerStore::get_last`], so the override is a no-op confirmation,
    /// not a mutation of already-hashed data.
    pub fn append(&self, mut block: Block) -> Block {
        let mut chain = self.chain.lock().unwrap();
        block.block_num = chain.last().map(|tail| tail.block_num + 1).unwrap_or(0);
        chain.push(block.clone());
        debug!(block_num = block.block_num, "appended block");
        block
    }

    /// Places `block` in ascending `block_num` order without touching its
    /// `block_num`, used both for explicit historical backfill and for
    /// received `NEW_BLOCK`/`HISTORICAL_BLOCK` messages whose `block_num` was
    /// already covered by a verified hash — overriding it here the way
    /// [`LedgerStore::append`] does would silently invalidate that hash.
    /// Rejects (returns `false`) if a block at that height already exists.
    pub fn insert(&self, block: Block) -> bool {
        let mut chain = self.chain.lock().unwrap();
        match chain.binary_search_by_key(&block.block_num, |b| b.block_num) {
            Ok(_) => {
                warn!(block_num = block.block_num, "rejecting duplicate height");
                false
            }
            Err(pos) => {
                chain.insert(pos, block);
                true
            }
        }
    }

    /// Same as [`LedgerStore::insert`] but surfaces the duplicate-height
    /// rejection as an error rather than a bool, for callers that prefer
    /// `?`-style error propagation.
    pub fn try_insert(&self, block: Block) -> Result<(), LedgerError> {
        let height = block.block_num;
        if self.insert(block) {
            Ok(())
        } else {
            Err(LedgerError::DuplicateHeight(height))
        }
    }

    /// A deep copy of the tail block, or `None` if the ledger is empty.
    pub fn get_last(&self) -> Option<Block> {
        self.chain.lock().unwrap().last().cloned()
    }

    /// A deep copy of the block at height `n`, or `None` if absent.
    pub fn get_by_number(&self, n: u32) -> Option<Block> {
        let chain = self.chain.lock().unwrap();
        chain
            .binary_search_by_key(&n, |b| b.block_num)
            .ok()
            .map(|idx| chain[idx].clone())
    }

    /// Read-only head-to-tail traversal, scoped to the lock's lifetime.
    pub fn with_blocks<R>(&self, f: impl FnOnce(&[Block]) -> R) -> R {
        let chain = self.chain.lock().unwrap();
        f(&chain)
    }

    pub fn len(&self) -> usize {
        self.chain.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(n: u32, prev_hash: [u8; 32]) -> Block {
        let mut b = Block::new(n, 1_000 + n, prev_hash);
        b.compute_hash();
        b
    }

    #[test]
    fn append_anchors_genesis_regardless_of_caller_block_num() {
        let ledger = LedgerStore::init();
        let mut genesis = Block::new(77, 0, [0; 32]);
        genesis.compute_hash();
        let stored = ledger.append(genesis);
        assert_eq!(stored.block_num, 0);
    }

    #[test]
    fn append_chains_sequentially() {
        let ledger = LedgerStore::init();
        let genesis = ledger.append(block(0, [0; 32]));
        let next = ledger.append(Block::new(999, 1, genesis.hash));
        assert_eq!(next.block_num, 1);
        assert_eq!(next.prev_hash, genesis.hash);
    }

    #[test]
    fn insert_preserves_declared_block_num() {
        let ledger = LedgerStore::init();
        let gap_block = block(5, [1; 32]);
        assert!(ledger.insert(gap_block.clone()));
        assert_eq!(ledger.get_by_number(5), Some(gap_block));
        assert_eq!(ledger.get_by_number(0), None);
    }

    #[test]
    fn insert_rejects_duplicate_height() {
        let ledger = LedgerStore::init();
        assert!(ledger.insert(block(2, [0; 32])));
        assert!(!ledger.insert(block(2, [9; 32])));
        assert_eq!(
            ledger.try_insert(block(2, [9; 32])),
            Err(LedgerError::DuplicateHeight(2))
        );
    }

    #[test]
    fn with_blocks_iterates_head_to_tail_in_order() {
        let ledger = LedgerStore::init();
        ledger.insert(block(2, [2; 32]));
        ledger.insert(block(0, [0; 32]));
        ledger.insert(block(1, [1; 32]));
        let heights: Vec<u32> = ledger.with_blocks(|blocks| blocks.iter().map(|b| b.block_num).collect());
        assert_eq!(heights, vec![0, 1, 2]);
    }

    #[test]
    fn deinit_releases_everything() {
        let ledger = LedgerStore::init();
        ledger.append(block(0, [0; 32]));
        assert!(!ledger.is_empty());
        ledger.deinit();
        assert!(ledger.is_empty());
        assert_eq!(ledger.get_last(), None);
    }
}
