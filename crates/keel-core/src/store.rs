//! In-memory [`KvStore`] for tests and ephemeral nodes.
//!
//! Stores everything in a `HashMap` with no persistence. The production node
//! uses RocksDB (keel-node).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::ChainError;
use crate::traits::KvStore;

/// Volatile key-value store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop an entry. Used by tests to simulate missing blocks.
    pub fn delete(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.write().remove(key)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
