//! Criterion benchmarks for keel-core hot paths.
//!
//! Covers: block hashing, block encode/decode, descendant windows, and
//! a reorganization round trip over an in-memory store.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use keel_core::block::ChainBlock;
use keel_core::chain::Blockchain;
use keel_core::constants::TESTNET_CHAIN_ID;
use keel_core::mempool::TxPool;
use keel_core::merkle::merkle_root;
use keel_core::store::MemoryStore;
use keel_core::types::{Block, BlockHeader, Hash256, Transaction};

fn sample_tx(nonce: u64) -> Transaction {
    Transaction {
        version: 1,
        from: Hash256([0x11; 32]),
        to: Hash256([0x22; 32]),
        value: 1_000,
        nonce,
        payload: vec![0u8; 64],
    }
}

fn child(chain: &Blockchain, parent: &ChainBlock, branch: u8) -> Arc<ChainBlock> {
    let txs = vec![sample_tx(parent.height() * 256 + u64::from(branch))];
    let txids: Vec<Hash256> = txs.iter().map(|t| t.txid().unwrap()).collect();
    chain
        .bind_block(Block {
            header: BlockHeader {
                version: 1,
                chain_id: TESTNET_CHAIN_ID,
                parent_hash: parent.hash(),
                height: parent.height() + 1,
                timestamp: 1_800_000_000,
                coinbase: Hash256([branch; 32]),
                state_root: parent.state_root(),
                txs_root: merkle_root(&txids),
                nonce: u64::from(branch),
            },
            transactions: txs,
        })
        .unwrap()
}

fn build_chain(len: usize) -> (Blockchain, Vec<Arc<ChainBlock>>) {
    let chain = Blockchain::new(
        TESTNET_CHAIN_ID,
        Arc::new(MemoryStore::new()),
        Arc::new(TxPool::with_defaults()),
    )
    .unwrap();
    let mut blocks = Vec::with_capacity(len);
    let mut parent = chain.genesis();
    for _ in 0..len {
        let b = child(&chain, &parent, 1);
        blocks.push(Arc::clone(&b));
        parent = b;
    }
    chain.admit(&blocks, &[]).unwrap();
    chain.set_tail(Arc::clone(blocks.last().unwrap())).unwrap();
    (chain, blocks)
}

fn bench_block_hash(c: &mut Criterion) {
    let (chain, blocks) = build_chain(1);
    let header = blocks[0].header().clone();
    drop(chain);
    c.bench_function("block_header_hash", |b| b.iter(|| black_box(&header).hash()));
}

fn bench_encode_decode(c: &mut Criterion) {
    let (_chain, blocks) = build_chain(1);
    let block = blocks[0].block().clone();
    let bytes = block.encode().unwrap();
    c.bench_function("block_encode", |b| b.iter(|| black_box(&block).encode().unwrap()));
    c.bench_function("block_decode", |b| b.iter(|| Block::decode(black_box(&bytes)).unwrap()));
}

fn bench_descendant_window(c: &mut Criterion) {
    let (chain, _blocks) = build_chain(256);
    let genesis = chain.genesis();
    c.bench_function("descendant_window_16_of_256", |b| {
        b.iter(|| chain.descendant_window(black_box(16), &genesis).unwrap())
    });
}

fn bench_reorg(c: &mut Criterion) {
    let (chain, blocks) = build_chain(64);
    let fork_point = &blocks[61];
    let a = child(&chain, fork_point, 2);
    let b = child(&chain, &a, 2);
    let c1 = child(&chain, &b, 2);
    chain.admit(&[a, b, Arc::clone(&c1)], &[]).unwrap();
    let main_tip = Arc::clone(blocks.last().unwrap());

    c.bench_function("reorg_round_trip", |bench| {
        bench.iter(|| {
            chain.set_tail(Arc::clone(&c1)).unwrap();
            chain.set_tail(Arc::clone(&main_tip)).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_block_hash,
    bench_encode_decode,
    bench_descendant_window,
    bench_reorg
);
criterion_main!(benches);
