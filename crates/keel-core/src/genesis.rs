//! Genesis block definition.
//!
//! The genesis block is height 0 with the zero hash as its parent. It carries
//! no transactions. All fields except the chain id are hardcoded, so every
//! node on a given chain computes the identical genesis block and hash.

use crate::constants::BLOCK_VERSION;
use crate::types::{Block, BlockHeader, Hash256};

/// Genesis block timestamp: January 1, 2026 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u64 = 1_767_225_600;

/// Coinbase pubkey hash of the genesis block: `BLAKE3(b"keel genesis")`.
pub fn genesis_coinbase() -> Hash256 {
    Hash256(blake3::hash(b"keel genesis").into())
}

/// The genesis block for `chain_id`.
pub fn genesis_block(chain_id: u32) -> Block {
    Block {
        header: BlockHeader {
            version: BLOCK_VERSION,
            chain_id,
            parent_hash: Hash256::ZERO,
            height: 0,
            timestamp: GENESIS_TIMESTAMP,
            coinbase: genesis_coinbase(),
            state_root: Hash256::ZERO,
            txs_root: Hash256::ZERO,
            nonce: 0,
        },
        transactions: Vec::new(),
    }
}

/// Well-known hash of the genesis block for `chain_id`.
pub fn genesis_hash(chain_id: u32) -> Hash256 {
    genesis_block(chain_id).hash()
}
