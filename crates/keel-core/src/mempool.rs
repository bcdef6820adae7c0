//! In-memory pool of unconfirmed transactions.
//!
//! Transactions are kept in arrival order and handed to block producers
//! oldest first. Transactions from reverted blocks are re-admitted through
//! [`TransactionPool::return_transactions`]; duplicates are ignored.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

use crate::constants::DEFAULT_TX_POOL_SIZE;
use crate::error::MempoolError;
use crate::traits::TransactionPool;
use crate::types::{Block, Hash256, Transaction};

#[derive(Default)]
struct PoolInner {
    entries: HashMap<Hash256, Transaction>,
    /// Arrival order. May hold ids already taken; those are skipped lazily.
    order: VecDeque<Hash256>,
}

/// Bounded FIFO transaction pool.
pub struct TxPool {
    inner: Mutex<PoolInner>,
    max_count: usize,
}

impl TxPool {
    /// Create a pool holding at most `max_count` transactions.
    pub fn new(max_count: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            max_count,
        }
    }

    /// Create a pool with the default capacity.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TX_POOL_SIZE)
    }

    /// Insert a validated transaction. Returns its id.
    pub fn insert(&self, tx: Transaction) -> Result<Hash256, MempoolError> {
        let txid = tx.txid().map_err(|e| MempoolError::Internal(e.to_string()))?;
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid));
        }
        if inner.entries.len() >= self.max_count {
            return Err(MempoolError::PoolFull);
        }
        inner.entries.insert(txid, tx);
        inner.order.push_back(txid);
        Ok(txid)
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.inner.lock().entries.contains_key(txid)
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }
}

impl TransactionPool for TxPool {
    fn return_transactions(&self, block: &Block) -> usize {
        let mut returned = 0;
        for tx in &block.transactions {
            match self.insert(tx.clone()) {
                Ok(_) => returned += 1,
                Err(MempoolError::AlreadyExists(_)) => {}
                Err(e) => debug!(block = %block.hash(), "dropping reverted transaction: {e}"),
            }
        }
        returned
    }

    fn take_pending(&self, max: usize) -> Vec<Transaction> {
        let mut inner = self.inner.lock();
        let mut taken = Vec::with_capacity(max.min(inner.entries.len()));
        while taken.len() < max {
            let Some(txid) = inner.order.pop_front() else {
                break;
            };
            if let Some(tx) = inner.entries.remove(&txid) {
                taken.push(tx);
            }
        }
        taken
    }

    fn get(&self, txid: &Hash256) -> Option<Transaction> {
        self.inner.lock().entries.get(txid).cloned()
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
