//! # keel-node
//! Durable storage, telemetry, and node composition.
//!
//! Wires the Keel chain state into a running node:
//! - [`storage::RocksStore`]: RocksDB-backed [`KvStore`](keel_core::traits::KvStore)
//! - [`telemetry::ChainMetrics`]: Prometheus head and reorg metrics
//! - [`fork_choice::LongestChain`]: highest-tip fork choice
//! - [`node::Node`]: composition and fatal-corruption handling
//! - [`config::NodeConfig`]: node configuration

pub mod config;
pub mod error;
pub mod fork_choice;
pub mod node;
pub mod storage;
pub mod telemetry;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
pub use storage::RocksStore;
