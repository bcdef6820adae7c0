//! The chain state: genesis, canonical tail, block caches, and the reorg engine.
//!
//! [`Blockchain`] is the single authority on which block is the canonical
//! head. Blocks enter through [`Blockchain::admit`] (validated batches), the
//! external [`ConsensusHandler`] decides which tip wins, and
//! [`Blockchain::set_tail`] is the only path that moves the tail. Moving the
//! tail onto another branch walks the abandoned blocks back to the common
//! ancestor and returns their transactions to the pool.
//!
//! The store is authoritative. Both caches are bounded accelerators: the
//! block cache (recently admitted blocks) and the detached-tip cache
//! (validated tips that are not canonical, kept for fork choice).
//!
//! A block reachable from the tail whose parent cannot be resolved means the
//! store broke its parent-link invariant. Every walk reports that as
//! [`ChainError::Corruption`], which callers must treat as fatal.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::block::{BlockLoader, ChainBlock};
use crate::cache::BoundedCache;
use crate::constants::{
    BLOCK_CACHE_SIZE, BLOCK_VERSION, DETACHED_TIP_CACHE_SIZE, HEAD_FINGERPRINT_DEPTH,
    MAX_BLOCK_TRANSACTIONS, TAIL_KEY,
};
use crate::error::ChainError;
use crate::genesis;
use crate::traits::{
    ChainTelemetry, ConsensusHandler, KvStore, NoopTelemetry, RootStateBackend, StateBackend,
    TransactionPool,
};
use crate::types::{Block, BlockHeader, Hash256, Transaction};

/// Cache capacities for a [`Blockchain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainOptions {
    pub block_cache_size: usize,
    pub detached_tip_cache_size: usize,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            block_cache_size: BLOCK_CACHE_SIZE,
            detached_tip_cache_size: DETACHED_TIP_CACHE_SIZE,
        }
    }
}

/// Result of [`Blockchain::set_tail`].
#[derive(Clone, Debug)]
pub struct TailSwitch {
    /// Common ancestor of the old and the new tail.
    pub ancestor: Arc<ChainBlock>,
    /// Number of blocks abandoned by the switch. Zero for a forward extension.
    pub reverted: u64,
}

impl TailSwitch {
    pub fn is_reorg(&self) -> bool {
        self.reverted > 0
    }
}

/// Result of [`Blockchain::admit`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdmitOutcome {
    /// Blocks written to the store.
    pub stored: usize,
    /// Tips offered to the detached-tip cache. The current tail is skipped.
    pub detached: usize,
}

/// Consistent view of the tail and the detached tips.
#[derive(Clone, Debug)]
pub struct HeadSnapshot {
    pub tail: Arc<ChainBlock>,
    pub detached_tips: Vec<Arc<ChainBlock>>,
}

/// Chain state container.
pub struct Blockchain {
    chain_id: u32,
    genesis: Arc<ChainBlock>,
    /// Current canonical head. Written only by [`set_tail`](Self::set_tail).
    tail: RwLock<Arc<ChainBlock>>,
    /// Serializes tail switches end to end.
    switch_lock: Mutex<()>,
    cached_blocks: BoundedCache<Hash256, Arc<ChainBlock>>,
    detached_tips: BoundedCache<Hash256, Arc<ChainBlock>>,
    loader: BlockLoader,
    consensus: RwLock<Option<Weak<dyn ConsensusHandler>>>,
    telemetry: Arc<dyn ChainTelemetry>,
}

impl Blockchain {
    /// Open the chain state on `store` with default caches, a root-only state
    /// backend, and no telemetry.
    pub fn new(
        chain_id: u32,
        store: Arc<dyn KvStore>,
        pool: Arc<dyn TransactionPool>,
    ) -> Result<Self, ChainError> {
        Self::with_components(
            chain_id,
            store,
            pool,
            Arc::new(RootStateBackend),
            Arc::new(NoopTelemetry),
            ChainOptions::default(),
        )
    }

    /// Open the chain state on `store`.
    ///
    /// Loads genesis, synthesizing and persisting it if the store has none,
    /// then loads the tail from [`TAIL_KEY`]. An absent tail key means a
    /// fresh chain: the tail becomes genesis and is persisted before this
    /// returns.
    pub fn with_components(
        chain_id: u32,
        store: Arc<dyn KvStore>,
        pool: Arc<dyn TransactionPool>,
        state: Arc<dyn StateBackend>,
        telemetry: Arc<dyn ChainTelemetry>,
        options: ChainOptions,
    ) -> Result<Self, ChainError> {
        let loader = BlockLoader::new(store, state, pool);
        let genesis = Arc::new(load_genesis(&loader, chain_id)?);
        let tail = load_tail(&loader, &genesis)?;
        info!(
            chain_id,
            genesis = %genesis.hash(),
            tail = %tail.hash(),
            height = tail.height(),
            "chain state loaded"
        );

        Ok(Self {
            chain_id,
            genesis,
            tail: RwLock::new(tail),
            switch_lock: Mutex::new(()),
            cached_blocks: BoundedCache::new(options.block_cache_size),
            detached_tips: BoundedCache::new(options.detached_tip_cache_size),
            loader,
            consensus: RwLock::new(None),
            telemetry,
        })
    }

    pub fn chain_id(&self) -> u32 {
        self.chain_id
    }

    pub fn genesis(&self) -> Arc<ChainBlock> {
        Arc::clone(&self.genesis)
    }

    /// The current canonical head.
    pub fn tail(&self) -> Arc<ChainBlock> {
        Arc::clone(&self.tail.read())
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        self.loader.store()
    }

    pub fn tx_pool(&self) -> &Arc<dyn TransactionPool> {
        self.loader.pool()
    }

    /// Attach the fork-choice handler. Only a weak reference is kept, so the
    /// handler may itself own an `Arc<Blockchain>`.
    pub fn set_consensus_handler(&self, handler: &Arc<dyn ConsensusHandler>) {
        *self.consensus.write() = Some(Arc::downgrade(handler));
    }

    /// The attached handler, if one was set and is still alive.
    pub fn consensus_handler(&self) -> Option<Arc<dyn ConsensusHandler>> {
        self.consensus.read().as_ref().and_then(Weak::upgrade)
    }

    /// Bind an externally built block to this chain's state backend and pool.
    pub fn bind_block(&self, block: Block) -> Result<Arc<ChainBlock>, ChainError> {
        Ok(Arc::new(self.loader.bind(block)?))
    }

    /// Build a block on top of the current tail from pending pool transactions.
    pub fn new_block(&self, coinbase: Hash256, timestamp: u64) -> Result<Arc<ChainBlock>, ChainError> {
        let parent = self.tail();
        self.new_block_from_parent(coinbase, &parent, timestamp)
    }

    /// Build a block on top of `parent` from pending pool transactions.
    ///
    /// The block inherits the parent's state root; executing transactions
    /// against state belongs to the block producer. If binding fails, the
    /// drawn transactions go back to the pool.
    pub fn new_block_from_parent(
        &self,
        coinbase: Hash256,
        parent: &ChainBlock,
        timestamp: u64,
    ) -> Result<Arc<ChainBlock>, ChainError> {
        let mut block = Block {
            header: BlockHeader {
                version: BLOCK_VERSION,
                chain_id: self.chain_id,
                parent_hash: parent.hash(),
                height: parent.height() + 1,
                timestamp,
                coinbase,
                state_root: parent.state_root(),
                txs_root: Hash256::ZERO,
                nonce: 0,
            },
            transactions: self.tx_pool().take_pending(MAX_BLOCK_TRANSACTIONS),
        };
        let bound = match block.compute_txs_root() {
            Ok(root) => {
                block.header.txs_root = root;
                self.loader.bind(block.clone())
            }
            Err(e) => Err(e),
        };
        bound.map(Arc::new).inspect_err(|e| {
            let returned = self.tx_pool().return_transactions(&block);
            warn!(returned, "block construction failed: {e}");
        })
    }

    /// Admit a validated batch.
    ///
    /// Every block in `all_blocks` is written to the store under its hash
    /// and then cached (unless already cached). The first failed write
    /// aborts the batch: blocks before it are durable, the rest are not. Every
    /// block in `detached_tips` other than the current tail enters the
    /// detached-tip cache; that never touches the store.
    pub fn admit(
        &self,
        all_blocks: &[Arc<ChainBlock>],
        detached_tips: &[Arc<ChainBlock>],
    ) -> Result<AdmitOutcome, ChainError> {
        let mut outcome = AdmitOutcome::default();
        for block in all_blocks {
            if let Err(e) = self.loader.persist(block) {
                warn!(
                    block = %block.hash(),
                    height = block.height(),
                    stored = outcome.stored,
                    "block admission aborted: {e}"
                );
                return Err(e);
            }
            self.cached_blocks
                .contains_or_add(block.hash(), Arc::clone(block));
            outcome.stored += 1;
        }
        {
            let tail = self.tail.read();
            for tip in detached_tips {
                if tip.hash() == tail.hash() {
                    debug!(block = %tip.hash(), "skipping detached tip that is the tail");
                    continue;
                }
                self.detached_tips.contains_or_add(tip.hash(), Arc::clone(tip));
                outcome.detached += 1;
            }
        }
        debug!(
            stored = outcome.stored,
            detached = outcome.detached,
            "admitted blocks"
        );
        Ok(outcome)
    }

    /// Snapshot of the detached tips, least recently admitted first.
    pub fn detached_tips(&self) -> Vec<Arc<ChainBlock>> {
        let _tail = self.tail.read();
        self.detached_tips.values()
    }

    /// The tail together with the detached tips, read atomically with
    /// respect to [`set_tail`](Self::set_tail).
    pub fn head_snapshot(&self) -> HeadSnapshot {
        let tail = self.tail.read();
        HeadSnapshot {
            tail: Arc::clone(&tail),
            detached_tips: self.detached_tips.values(),
        }
    }

    /// Look up a block: block cache first, then the store.
    ///
    /// A block loaded from the store is not added to the cache. Missing
    /// entries and entries that fail to decode or bind both yield `None`.
    pub fn get_block(&self, hash: &Hash256) -> Option<Arc<ChainBlock>> {
        if let Some(block) = self.cached_blocks.peek(hash) {
            return Some(block);
        }
        match self.loader.load(hash) {
            Ok(block) => Some(Arc::new(block)),
            Err(ChainError::BlockNotFound(_)) => None,
            Err(e) => {
                debug!(block = %hash, "unusable stored block: {e}");
                None
            }
        }
    }

    /// Look up a transaction in the tail block only.
    pub fn get_transaction(&self, txid: &Hash256) -> Option<Transaction> {
        self.tail().get_transaction(txid).cloned()
    }

    /// Parent of a block already reachable from the chain.
    fn parent_of(&self, block: &ChainBlock) -> Result<Arc<ChainBlock>, ChainError> {
        self.get_block(&block.parent_hash())
            .ok_or(ChainError::Corruption {
                hash: block.hash(),
                height: block.height(),
            })
    }

    /// Highest block that is an ancestor of both `block` and the current tail.
    ///
    /// `block` is resolved by its own hash, or by its parent hash if the
    /// block itself is unknown.
    ///
    /// # Errors
    ///
    /// - [`ChainError::NotLocated`] if neither `block` nor its parent is known
    /// - [`ChainError::Corruption`] if a parent link breaks before the walks meet
    pub fn find_common_ancestor(&self, block: &ChainBlock) -> Result<Arc<ChainBlock>, ChainError> {
        self.common_ancestor_with(self.tail(), block)
    }

    fn common_ancestor_with(
        &self,
        tail: Arc<ChainBlock>,
        block: &ChainBlock,
    ) -> Result<Arc<ChainBlock>, ChainError> {
        let mut target = self
            .get_block(&block.hash())
            .or_else(|| self.get_block(&block.parent_hash()))
            .ok_or(ChainError::NotLocated(block.hash()))?;
        let mut tail = tail;

        while tail.height() > target.height() {
            tail = self.parent_of(&tail)?;
        }
        while target.height() > tail.height() {
            target = self.parent_of(&target)?;
        }
        while tail.hash() != target.hash() {
            tail = self.parent_of(&tail)?;
            target = self.parent_of(&target)?;
        }
        Ok(target)
    }

    /// Make `new_tail` the canonical head.
    ///
    /// The tail pointer is persisted first; if that write fails nothing in
    /// memory changes. The pointer swap and the removal of `new_tail` from
    /// the detached tips happen under one write lock. If the old tail is not
    /// an ancestor of the new one, every block from the old tail down to
    /// (excluding) the common ancestor hands its transactions back to the pool.
    ///
    /// # Errors
    ///
    /// - [`ChainError::Storage`] if the tail pointer cannot be written
    /// - [`ChainError::NotLocated`] if the old tail cannot be resolved
    /// - [`ChainError::Corruption`] if a parent link breaks during the walk
    pub fn set_tail(&self, new_tail: Arc<ChainBlock>) -> Result<TailSwitch, ChainError> {
        let _switch = self.switch_lock.lock();
        let old_tail = self.tail();

        self.store_tail(&new_tail)?;
        {
            let mut tail = self.tail.write();
            self.detached_tips.remove(&new_tail.hash());
            *tail = Arc::clone(&new_tail);
        }
        info!(
            old = %old_tail.hash(),
            new = %new_tail.hash(),
            height = new_tail.height(),
            "tail switched"
        );

        let ancestor = self.common_ancestor_with(Arc::clone(&new_tail), &old_tail)?;
        if ancestor.hash() == old_tail.hash() {
            self.report_head(&new_tail)?;
            return Ok(TailSwitch { ancestor, reverted: 0 });
        }

        let mut reverted = old_tail;
        let mut count = 0u64;
        while reverted.hash() != ancestor.hash() {
            count += 1;
            let returned = reverted.return_transactions();
            debug!(
                block = %reverted.hash(),
                height = reverted.height(),
                returned,
                "reverted block"
            );
            reverted = self.parent_of(&reverted)?;
        }

        warn!(
            reverted = count,
            ancestor = %ancestor.hash(),
            ancestor_height = ancestor.height(),
            "chain reorganized"
        );
        self.telemetry.reorg(count);
        self.report_head(&new_tail)?;
        Ok(TailSwitch { ancestor, reverted: count })
    }

    fn report_head(&self, tail: &ChainBlock) -> Result<(), ChainError> {
        let fingerprint = self.ancestor_hash(HEAD_FINGERPRINT_DEPTH)?.fingerprint();
        self.telemetry.head_changed(tail.height(), fingerprint);
        Ok(())
    }

    fn store_tail(&self, block: &ChainBlock) -> Result<(), ChainError> {
        self.store().put(TAIL_KEY, block.hash().as_bytes())
    }

    /// Hash of the block `depth` parent links below the tail, stopping at genesis.
    pub fn ancestor_hash(&self, depth: usize) -> Result<Hash256, ChainError> {
        let mut block = self.tail();
        for _ in 0..depth {
            if block.hash() == self.genesis.hash() {
                break;
            }
            block = self.parent_of(&block)?;
        }
        Ok(block.hash())
    }

    /// Up to `n` canonical blocks after `block`, up to and including the tail.
    ///
    /// Blocks are ordered by ascending height. When more than `n` blocks lie
    /// between `block` and the tail, the `n` nearest `block` are returned.
    ///
    /// # Errors
    ///
    /// - [`ChainError::NotCanonical`] if the walk reaches genesis without meeting `block`
    /// - [`ChainError::Corruption`] if a parent link breaks during the walk
    pub fn descendant_window(
        &self,
        n: usize,
        block: &ChainBlock,
    ) -> Result<Vec<Arc<ChainBlock>>, ChainError> {
        let mut window: VecDeque<Arc<ChainBlock>> = VecDeque::with_capacity(n);
        let mut current = self.tail();
        while current.hash() != block.hash() {
            if current.hash() == self.genesis.hash() {
                return Err(ChainError::NotCanonical(block.hash()));
            }
            if n > 0 {
                if window.len() == n {
                    window.pop_front();
                }
                window.push_back(Arc::clone(&current));
            }
            current = self.parent_of(&current)?;
        }
        Ok(window.into_iter().rev().collect())
    }

    /// Human-readable trace of up to `count` blocks from the tail toward genesis.
    ///
    /// The tail itself is the first line, so `count` includes it.
    pub fn dump(&self, count: usize) -> String {
        let mut lines = Vec::with_capacity(count);
        let mut block = self.tail();
        for _ in 0..count {
            lines.push(block.summary());
            if block.hash() == self.genesis.hash() {
                break;
            }
            match self.get_block(&block.parent_hash()) {
                Some(parent) => block = parent,
                None => {
                    lines.push(format!("{{missing parent {}}}", block.parent_hash()));
                    break;
                }
            }
        }
        lines.join("\n")
    }

    #[cfg(test)]
    fn cached_block_count(&self) -> usize {
        self.cached_blocks.len()
    }
}

fn load_genesis(loader: &BlockLoader, chain_id: u32) -> Result<ChainBlock, ChainError> {
    let hash = genesis::genesis_hash(chain_id);
    match loader.load(&hash) {
        Ok(block) => Ok(block),
        Err(ChainError::BlockNotFound(_) | ChainError::Encoding(_)) => {
            let block = loader.bind(genesis::genesis_block(chain_id))?;
            loader.persist(&block)?;
            info!(chain_id, genesis = %hash, "created genesis block");
            Ok(block)
        }
        Err(e) => Err(e),
    }
}

fn load_tail(
    loader: &BlockLoader,
    genesis: &Arc<ChainBlock>,
) -> Result<Arc<ChainBlock>, ChainError> {
    let Some(bytes) = loader.store().get(TAIL_KEY)? else {
        loader
            .store()
            .put(TAIL_KEY, genesis.hash().as_bytes())?;
        return Ok(Arc::clone(genesis));
    };
    let hash = Hash256::from_slice(&bytes)
        .ok_or_else(|| ChainError::Encoding(format!("tail pointer is {} bytes", bytes.len())))?;
    if hash == genesis.hash() {
        return Ok(Arc::clone(genesis));
    }
    Ok(Arc::new(loader.load(&hash)?))
}
