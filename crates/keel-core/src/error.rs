//! Error types for the Keel chain state.
use thiserror::Error;

use crate::types::Hash256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("block not found: {0}")] BlockNotFound(Hash256),
    #[error("cannot locate block {0} in the chain")] NotLocated(Hash256),
    #[error("block {0} is not on the canonical chain")] NotCanonical(Hash256),
    #[error("storage: {0}")] Storage(String),
    #[error("encoding: {0}")] Encoding(String),
    #[error("transaction root mismatch in block {hash}: header {expected}, computed {got}")] TxRootMismatch { hash: Hash256, expected: Hash256, got: Hash256 },
    #[error("chain corruption: parent of block {hash} (height {height}) is unreachable")] Corruption { hash: Hash256, height: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already in pool: {0}")] AlreadyExists(Hash256),
    #[error("pool full")] PoolFull,
    #[error("internal: {0}")] Internal(String),
}

impl ChainError {
    /// Whether the error signals a broken parent-link invariant in storage.
    ///
    /// Fatal errors must never be retried; the node terminates on them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}
