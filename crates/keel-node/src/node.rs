//! Node composition.
//!
//! The [`Node`] wires RocksDB storage, the transaction pool, Prometheus
//! telemetry, the chain state, and longest-chain fork choice together. It is
//! also where a detected chain corruption ends the process: the core reports
//! it as a fatal [`ChainError`], and continuing would serve a chain whose
//! parent links are broken.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use keel_core::block::ChainBlock;
use keel_core::chain::{AdmitOutcome, Blockchain};
use keel_core::constants::HEAD_FINGERPRINT_DEPTH;
use keel_core::error::ChainError;
use keel_core::mempool::TxPool;
use keel_core::traits::{
    ChainTelemetry, ConsensusHandler, KvStore, RootStateBackend, TransactionPool,
};
use keel_core::types::{Block, Hash256};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::fork_choice::LongestChain;
use crate::storage::RocksStore;
use crate::telemetry::ChainMetrics;

/// Summary of the canonical head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStatus {
    pub chain_id: u32,
    pub genesis: Hash256,
    pub tail: Hash256,
    pub height: u64,
    pub detached_tips: usize,
    pub pending_transactions: usize,
}

/// Result of [`Node::import`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub admitted: AdmitOutcome,
    pub tail: Hash256,
    pub height: u64,
}

/// A running node.
pub struct Node {
    chain: Arc<Blockchain>,
    pool: Arc<TxPool>,
    metrics: ChainMetrics,
    /// Owns the fork-choice handler; the chain only holds a weak reference.
    fork_choice: Arc<dyn ConsensusHandler>,
    config: NodeConfig,
}

impl Node {
    /// Open the node's RocksDB store under `config.db_path()` and load the chain.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = RocksStore::open(config.db_path())?;
        Self::with_store(config, Arc::new(store))
    }

    /// Build a node over an existing store.
    pub fn with_store(config: NodeConfig, store: Arc<dyn KvStore>) -> Result<Self, NodeError> {
        let pool = Arc::new(TxPool::new(config.tx_pool_size));
        let metrics = ChainMetrics::new()?;
        let chain = Blockchain::with_components(
            config.chain_id,
            store,
            pool.clone(),
            Arc::new(RootStateBackend),
            Arc::new(metrics.clone()),
            config.chain_options(),
        )
        .map_err(check_fatal)?;
        let chain = Arc::new(chain);

        let fork_choice: Arc<dyn ConsensusHandler> = Arc::new(LongestChain);
        chain.set_consensus_handler(&fork_choice);

        let tail = chain.tail();
        let fingerprint = chain
            .ancestor_hash(HEAD_FINGERPRINT_DEPTH)
            .map_err(check_fatal)?
            .fingerprint();
        metrics.head_changed(tail.height(), fingerprint);
        info!(
            chain_id = config.chain_id,
            tail = %tail.hash(),
            height = tail.height(),
            "node ready"
        );

        Ok(Self {
            chain,
            pool,
            metrics,
            fork_choice,
            config,
        })
    }

    pub fn chain(&self) -> &Arc<Blockchain> {
        &self.chain
    }

    pub fn pool(&self) -> &Arc<TxPool> {
        &self.pool
    }

    pub fn metrics(&self) -> &ChainMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn status(&self) -> ChainStatus {
        let snapshot = self.chain.head_snapshot();
        ChainStatus {
            chain_id: self.chain.chain_id(),
            genesis: self.chain.genesis().hash(),
            tail: snapshot.tail.hash(),
            height: snapshot.tail.height(),
            detached_tips: snapshot.detached_tips.len(),
            pending_transactions: self.pool.len(),
        }
    }

    /// Admit a validated batch and run fork choice.
    ///
    /// Every block is stored; blocks with no child inside the batch become
    /// detached tips for fork choice.
    pub fn import(&self, blocks: Vec<Block>) -> Result<ImportOutcome, NodeError> {
        let bound = blocks
            .into_iter()
            .map(|b| self.chain.bind_block(b))
            .collect::<Result<Vec<_>, _>>()?;
        let tips = batch_tips(&bound);
        debug!(blocks = bound.len(), tips = tips.len(), "importing batch");

        let admitted = self.chain.admit(&bound, &tips)?;
        self.run_fork_choice()?;

        let tail = self.chain.tail();
        Ok(ImportOutcome {
            admitted,
            tail: tail.hash(),
            height: tail.height(),
        })
    }

    /// Build a block on the tail from pending transactions and import it.
    pub fn produce_block(
        &self,
        coinbase: Hash256,
        timestamp: u64,
    ) -> Result<ImportOutcome, NodeError> {
        let block = self.chain.new_block(coinbase, timestamp)?;
        self.import(vec![block.block().clone()])
    }

    fn run_fork_choice(&self) -> Result<(), NodeError> {
        match self.chain.consensus_handler() {
            Some(handler) => handler.fork_choice(&self.chain).map_err(check_fatal)?,
            None => warn!("no consensus handler attached; tail left unchanged"),
        }
        Ok(())
    }

    /// The owned fork-choice handler.
    pub fn fork_choice(&self) -> &Arc<dyn ConsensusHandler> {
        &self.fork_choice
    }
}

/// Blocks of a batch that no other block in the batch builds on.
fn batch_tips(blocks: &[Arc<ChainBlock>]) -> Vec<Arc<ChainBlock>> {
    let parents: HashSet<Hash256> = blocks.iter().map(|b| b.parent_hash()).collect();
    blocks
        .iter()
        .filter(|b| !parents.contains(&b.hash()))
        .cloned()
        .collect()
}

/// Pass ordinary errors through; terminate on chain corruption.
fn check_fatal(err: ChainError) -> ChainError {
    if err.is_fatal() {
        error!("unrecoverable chain state: {err}");
        std::process::abort();
    }
    err
}
