//! Chain-state constants.

/// Capacity of the recently-touched block cache.
pub const BLOCK_CACHE_SIZE: usize = 1024;

/// Capacity of the detached-tip cache consulted by fork choice.
pub const DETACHED_TIP_CACHE_SIZE: usize = 64;

/// Default transaction pool capacity.
pub const DEFAULT_TX_POOL_SIZE: usize = 4096;

/// Store key holding the hash of the current tail block.
pub const TAIL_KEY: &[u8] = b"blockchain_tail";

/// Chain id of the test network.
pub const TESTNET_CHAIN_ID: u32 = 1;

/// Chain id of the main network.
pub const MAINNET_CHAIN_ID: u32 = 1 << 4;

/// How far below the tail the head fingerprint is taken.
pub const HEAD_FINGERPRINT_DEPTH: usize = 6;

/// Maximum transactions drawn from the pool for a new block.
pub const MAX_BLOCK_TRANSACTIONS: usize = 1024;

/// Current block header version.
pub const BLOCK_VERSION: u64 = 1;
