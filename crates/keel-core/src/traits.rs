//! Trait interfaces between the chain state and its collaborators.
//!
//! - [`KvStore`]: durable key-value persistence (keel-node implements with RocksDB)
//! - [`TransactionPool`]: pending transactions (see [`crate::mempool::TxPool`])
//! - [`StateBackend`]: opens account state at a state root
//! - [`ConsensusHandler`]: fork choice, late-bound onto [`Blockchain`]
//! - [`ChainTelemetry`]: one-way head and reorg signals

use std::sync::Arc;

use crate::chain::Blockchain;
use crate::error::ChainError;
use crate::types::{Block, Hash256, Transaction};

/// Durable key-value store.
///
/// Each individual `put` must be crash-consistent. Keys are either a raw
/// 32-byte block hash or the ASCII [`TAIL_KEY`](crate::constants::TAIL_KEY).
pub trait KvStore: Send + Sync {
    /// Read the value under `key`. `Ok(None)` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError>;

    /// Write `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError>;
}

/// Pool of unconfirmed transactions shared by the chain and block producers.
pub trait TransactionPool: Send + Sync {
    /// Re-admit the transactions of a reverted block.
    ///
    /// Returns how many were accepted back into the pool.
    fn return_transactions(&self, block: &Block) -> usize;

    /// Remove and return up to `max` pending transactions for a new block,
    /// oldest first.
    fn take_pending(&self, max: usize) -> Vec<Transaction>;

    /// Look up a pending transaction.
    fn get(&self, txid: &Hash256) -> Option<Transaction>;

    /// Number of pending transactions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read handle on account state at a fixed root.
pub trait StateView: Send + Sync {
    /// Root this view was opened at.
    fn root(&self) -> Hash256;
}

/// Opens account state views. State execution itself lives outside the chain state.
pub trait StateBackend: Send + Sync {
    fn open_state(&self, root: &Hash256) -> Result<Arc<dyn StateView>, ChainError>;
}

/// Fork-choice algorithm driving [`Blockchain::set_tail`].
///
/// Attached after construction with [`Blockchain::set_consensus_handler`];
/// the chain keeps only a weak reference.
pub trait ConsensusHandler: Send + Sync {
    /// Inspect the tail and detached tips and switch the tail if a better tip exists.
    fn fork_choice(&self, chain: &Blockchain) -> Result<(), ChainError>;
}

/// Fire-and-forget telemetry sink for chain events.
pub trait ChainTelemetry: Send + Sync {
    /// The canonical head moved to `height`; `fingerprint` digests the hash
    /// [`HEAD_FINGERPRINT_DEPTH`](crate::constants::HEAD_FINGERPRINT_DEPTH) blocks below it.
    fn head_changed(&self, height: u64, fingerprint: i64);

    /// A reorganization reverted `reverted` blocks.
    fn reorg(&self, reverted: u64);
}

/// Telemetry sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl ChainTelemetry for NoopTelemetry {
    fn head_changed(&self, _height: u64, _fingerprint: i64) {}

    fn reorg(&self, _reverted: u64) {}
}

/// State view that carries only its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootState(pub Hash256);

impl StateView for RootState {
    fn root(&self) -> Hash256 {
        self.0
    }
}

/// Backend that opens a [`RootState`] for any root.
#[derive(Debug, Default, Clone, Copy)]
pub struct RootStateBackend;

impl StateBackend for RootStateBackend {
    fn open_state(&self, root: &Hash256) -> Result<Arc<dyn StateView>, ChainError> {
        Ok(Arc::new(RootState(*root)))
    }
}
