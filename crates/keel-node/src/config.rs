//! Node configuration.
//!
//! Provides [`NodeConfig`] with defaults for the data directory, chain id,
//! logging, and cache sizes.

use std::path::PathBuf;

use keel_core::chain::ChainOptions;
use keel_core::constants::{
    BLOCK_CACHE_SIZE, DEFAULT_TX_POOL_SIZE, DETACHED_TIP_CACHE_SIZE, MAINNET_CHAIN_ID,
};

/// Configuration for a node instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Network the node follows.
    pub chain_id: u32,
    /// Log level filter string (e.g. "info", "debug", "keel_core=trace").
    pub log_level: String,
    /// Capacity of the recently-admitted block cache.
    pub block_cache_size: usize,
    /// Capacity of the detached-tip cache.
    pub detached_tip_cache_size: usize,
    /// Capacity of the transaction pool.
    pub tx_pool_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keel");

        Self {
            data_dir,
            chain_id: MAINNET_CHAIN_ID,
            log_level: "info".to_string(),
            block_cache_size: BLOCK_CACHE_SIZE,
            detached_tip_cache_size: DETACHED_TIP_CACHE_SIZE,
            tx_pool_size: DEFAULT_TX_POOL_SIZE,
        }
    }
}

impl NodeConfig {
    /// Path to the RocksDB chain data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chaindata")
    }

    /// Cache capacities handed to the chain state.
    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            block_cache_size: self.block_cache_size,
            detached_tip_cache_size: self.detached_tip_cache_size,
        }
    }
}
