//! Shared builders for chain-state tests.

use std::sync::Arc;

use parking_lot::Mutex;

use keel_core::block::ChainBlock;
use keel_core::chain::Blockchain;
use keel_core::constants::TESTNET_CHAIN_ID;
use keel_core::mempool::TxPool;
use keel_core::merkle;
use keel_core::store::MemoryStore;
use keel_core::traits::TransactionPool;
use keel_core::types::{Block, BlockHeader, Hash256, Transaction};

pub const CHAIN_ID: u32 = TESTNET_CHAIN_ID;

/// In-memory chain with its store and pool.
pub struct TestChain {
    pub store: Arc<MemoryStore>,
    pub pool: Arc<TxPool>,
    pub chain: Blockchain,
}

/// Fresh chain on an empty in-memory store.
pub fn memory_chain() -> TestChain {
    let store = Arc::new(MemoryStore::new());
    let pool = Arc::new(TxPool::with_defaults());
    let chain = Blockchain::new(CHAIN_ID, store.clone(), pool.clone()).unwrap();
    TestChain { store, pool, chain }
}

/// Pool that logs, in call order, each block handing its transactions back.
#[derive(Default)]
pub struct RecordingPool {
    returned: Mutex<Vec<Hash256>>,
}

impl RecordingPool {
    /// Hashes of the blocks returned so far.
    pub fn returned(&self) -> Vec<Hash256> {
        self.returned.lock().clone()
    }
}

impl TransactionPool for RecordingPool {
    fn return_transactions(&self, block: &Block) -> usize {
        self.returned.lock().push(block.hash());
        block.transactions.len()
    }

    fn take_pending(&self, _max: usize) -> Vec<Transaction> {
        Vec::new()
    }

    fn get(&self, _txid: &Hash256) -> Option<Transaction> {
        None
    }

    fn len(&self) -> usize {
        0
    }
}

/// Fresh chain whose pool records returned blocks instead of holding them.
pub fn recording_chain() -> (Blockchain, Arc<RecordingPool>) {
    let pool = Arc::new(RecordingPool::default());
    let chain = Blockchain::new(CHAIN_ID, Arc::new(MemoryStore::new()), pool.clone()).unwrap();
    (chain, pool)
}

/// Transfer whose id is unique per (`branch`, `nonce`).
pub fn make_tx(branch: u8, nonce: u64) -> Transaction {
    Transaction {
        version: 1,
        from: Hash256([branch; 32]),
        to: Hash256([0xEE; 32]),
        value: 1,
        nonce,
        payload: vec![],
    }
}

/// Block on `parent` with a correct transaction root.
pub fn make_block(parent: &ChainBlock, branch: u8, txs: Vec<Transaction>) -> Block {
    let txids: Vec<Hash256> = txs.iter().map(|tx| tx.txid().unwrap()).collect();
    Block {
        header: BlockHeader {
            version: 1,
            chain_id: CHAIN_ID,
            parent_hash: parent.hash(),
            height: parent.height() + 1,
            timestamp: 1_800_000_000 + parent.height(),
            coinbase: Hash256([branch; 32]),
            state_root: parent.state_root(),
            txs_root: merkle::merkle_root(&txids),
            nonce: u64::from(branch),
        },
        transactions: txs,
    }
}

/// Bind `len` blocks on top of `from` without admitting them. Each block
/// carries one transaction tagged with `branch` and its height.
pub fn build_branch(
    chain: &Blockchain,
    from: &Arc<ChainBlock>,
    len: usize,
    branch: u8,
) -> Vec<Arc<ChainBlock>> {
    let mut blocks = Vec::with_capacity(len);
    let mut parent = Arc::clone(from);
    for _ in 0..len {
        let tx = make_tx(branch, parent.height() + 1);
        let block = chain
            .bind_block(make_block(&parent, branch, vec![tx]))
            .unwrap();
        blocks.push(Arc::clone(&block));
        parent = block;
    }
    blocks
}

/// Bind and admit `len` blocks on top of `from`, in height order.
pub fn extend(
    chain: &Blockchain,
    from: &Arc<ChainBlock>,
    len: usize,
    branch: u8,
) -> Vec<Arc<ChainBlock>> {
    let blocks = build_branch(chain, from, len, branch);
    chain.admit(&blocks, &[]).unwrap();
    blocks
}

/// Transaction ids carried by `blocks`.
pub fn txids_of(blocks: &[Arc<ChainBlock>]) -> Vec<Hash256> {
    blocks
        .iter()
        .flat_map(|b| b.transactions().iter().map(|tx| tx.txid().unwrap()))
        .collect()
}
