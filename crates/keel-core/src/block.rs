//! Chain-bound blocks and the block loader.
//!
//! A [`ChainBlock`] is a [`Block`] bound for use by the chain state: its hash
//! is cached, its transactions are indexed by id (after checking them against
//! the header's transaction root), its account state is opened at the
//! header's state root, and it carries the shared transaction pool so that a
//! reverted block can hand its transactions back.
//!
//! [`BlockLoader`] rebuilds such blocks from stored bytes and writes them back.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ChainError;
use crate::merkle;
use crate::traits::{KvStore, StateBackend, StateView, TransactionPool};
use crate::types::{Block, BlockHeader, Hash256, Transaction};

/// Transaction id to position within a block.
#[derive(Clone, Debug, Default)]
pub struct TxIndex {
    positions: HashMap<Hash256, usize>,
}

impl TxIndex {
    /// Index `txids`, which must be in block order.
    fn from_txids(txids: &[Hash256]) -> Self {
        Self {
            positions: txids.iter().enumerate().map(|(i, id)| (*id, i)).collect(),
        }
    }

    pub fn position(&self, txid: &Hash256) -> Option<usize> {
        self.positions.get(txid).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A block bound to its state view, transaction index, and the transaction pool.
pub struct ChainBlock {
    hash: Hash256,
    block: Block,
    txs: TxIndex,
    state: Arc<dyn StateView>,
    pool: Option<Arc<dyn TransactionPool>>,
}

impl ChainBlock {
    /// Bind `block`.
    ///
    /// # Errors
    ///
    /// - [`ChainError::TxRootMismatch`] if the transactions do not match the header
    /// - any error the state backend reports while opening the state view
    pub fn bind(
        block: Block,
        state: &dyn StateBackend,
        pool: Option<Arc<dyn TransactionPool>>,
    ) -> Result<Self, ChainError> {
        let hash = block.hash();
        let txids = block.txids()?;
        let computed = merkle::merkle_root(&txids);
        if computed != block.header.txs_root {
            return Err(ChainError::TxRootMismatch {
                hash,
                expected: block.header.txs_root,
                got: computed,
            });
        }
        let state = state.open_state(&block.header.state_root)?;
        Ok(Self {
            hash,
            txs: TxIndex::from_txids(&txids),
            block,
            state,
            pool,
        })
    }

    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    pub fn parent_hash(&self) -> Hash256 {
        self.block.header.parent_hash
    }

    pub fn height(&self) -> u64 {
        self.block.header.height
    }

    pub fn state_root(&self) -> Hash256 {
        self.block.header.state_root
    }

    pub fn txs_root(&self) -> Hash256 {
        self.block.header.txs_root
    }

    pub fn coinbase(&self) -> Hash256 {
        self.block.header.coinbase
    }

    pub fn header(&self) -> &BlockHeader {
        &self.block.header
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.block.transactions
    }

    pub fn state(&self) -> &Arc<dyn StateView> {
        &self.state
    }

    /// Look up a transaction of this block by id.
    pub fn get_transaction(&self, txid: &Hash256) -> Option<&Transaction> {
        self.txs
            .position(txid)
            .and_then(|i| self.block.transactions.get(i))
    }

    /// Hand this block's transactions back to the pool.
    ///
    /// Returns how many the pool accepted. A block bound without a pool
    /// returns nothing.
    pub fn return_transactions(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.return_transactions(&self.block),
            None => 0,
        }
    }

    /// One-line summary used by chain dumps.
    pub fn summary(&self) -> String {
        format!(
            "{{{}, hash: {}, parent: {}, stateRoot: {}, coinbase: {}}}",
            self.height(),
            self.hash,
            self.parent_hash(),
            self.state_root(),
            self.coinbase(),
        )
    }
}

impl fmt::Debug for ChainBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBlock")
            .field("hash", &self.hash)
            .field("height", &self.height())
            .field("parent", &self.parent_hash())
            .field("txs", &self.txs.len())
            .finish()
    }
}

/// Reads blocks from and writes blocks to the durable store.
#[derive(Clone)]
pub struct BlockLoader {
    store: Arc<dyn KvStore>,
    state: Arc<dyn StateBackend>,
    pool: Arc<dyn TransactionPool>,
}

impl BlockLoader {
    pub fn new(
        store: Arc<dyn KvStore>,
        state: Arc<dyn StateBackend>,
        pool: Arc<dyn TransactionPool>,
    ) -> Self {
        Self { store, state, pool }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<dyn TransactionPool> {
        &self.pool
    }

    /// Bind a block to this loader's state backend and pool.
    pub fn bind(&self, block: Block) -> Result<ChainBlock, ChainError> {
        ChainBlock::bind(block, self.state.as_ref(), Some(Arc::clone(&self.pool)))
    }

    /// Load and bind the block stored under `hash`.
    ///
    /// # Errors
    ///
    /// - [`ChainError::BlockNotFound`] if the store has no entry
    /// - [`ChainError::Encoding`] if the stored bytes do not decode
    /// - [`ChainError::Storage`] if the read itself fails
    pub fn load(&self, hash: &Hash256) -> Result<ChainBlock, ChainError> {
        let bytes = self
            .store
            .get(hash.as_bytes())?
            .ok_or(ChainError::BlockNotFound(*hash))?;
        let block = Block::decode(&bytes)?;
        if block.hash() != *hash {
            return Err(ChainError::Encoding(format!(
                "stored block under {hash} hashes to {}",
                block.hash()
            )));
        }
        self.bind(block)
    }

    /// Serialize `block` and write it under its hash.
    pub fn persist(&self, block: &ChainBlock) -> Result<(), ChainError> {
        let bytes = block.block().encode()?;
        self.store.put(block.hash().as_bytes(), &bytes)
    }
}
