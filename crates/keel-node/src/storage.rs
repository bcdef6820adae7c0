//! RocksDB-backed durable store.
//!
//! Implements [`KvStore`] over two column families: 32-byte keys (block
//! hashes) live in `blocks`, every other key (the tail pointer) lives in
//! `metadata`. Metadata writes are synced to disk before returning so the
//! tail pointer survives a crash as soon as `put` succeeds.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteOptions};

use keel_core::error::ChainError;
use keel_core::traits::KvStore;

const CF_BLOCKS: &str = "blocks";
const CF_METADATA: &str = "metadata";

const ALL_CFS: &[&str] = &[CF_BLOCKS, CF_METADATA];

/// Length of a block-hash key.
const HASH_KEY_LEN: usize = 32;

/// Durable key-value store on RocksDB.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        tracing::debug!(path = %path.as_ref().display(), "opened block store");
        Ok(Self { db })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), ChainError> {
        self.db
            .flush()
            .map_err(|e| ChainError::Storage(e.to_string()))
    }

    /// Column family holding `key`.
    fn cf_for(key: &[u8]) -> &'static str {
        if key.len() == HASH_KEY_LEN {
            CF_BLOCKS
        } else {
            CF_METADATA
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, ChainError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ChainError::Storage(format!("missing column family: {name}")))
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        let cf = self.cf_handle(Self::cf_for(key))?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| ChainError::Storage(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        let name = Self::cf_for(key);
        let cf = self.cf_handle(name)?;
        let mut opts = WriteOptions::default();
        opts.set_sync(name == CF_METADATA);
        self.db
            .put_cf_opt(cf, key, value, &opts)
            .map_err(|e| ChainError::Storage(e.to_string()))
    }
}
