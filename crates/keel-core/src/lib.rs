//! # keel-core
//! Chain state for a Keel node: the canonical chain, its tail, the reorg
//! engine, and block persistence over an abstract key-value store.

pub mod block;
pub mod cache;
pub mod chain;
pub mod constants;
pub mod error;
pub mod genesis;
pub mod mempool;
pub mod merkle;
pub mod store;
pub mod traits;
pub mod types;
