//! Core chain types: hashes, transactions, block headers, blocks.
//!
//! Block headers hash to double SHA-256 over a fixed byte layout; transaction
//! ids are BLAKE3 over the canonical bincode encoding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::ChainError;
use crate::merkle;

/// A 32-byte hash value.
///
/// Used for block hashes (SHA-256), transaction ids (BLAKE3), state roots,
/// transaction roots, and coinbase pubkey hashes.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Genesis uses it as its parent sentinel.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Parse a hash from a byte slice. Returns `None` unless exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Self::from_slice(&bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Short numeric digest of the hash: its last two bytes, big-endian.
    ///
    /// Equal to parsing the last four hex digits of the hash as an integer.
    pub fn fingerprint(&self) -> i64 {
        i64::from(u16::from_be_bytes([self.0[30], self.0[31]]))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An account-style value transfer.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Sender pubkey hash.
    pub from: Hash256,
    /// Recipient pubkey hash.
    pub to: Hash256,
    /// Transferred amount.
    pub value: u64,
    /// Sender account nonce.
    pub nonce: u64,
    /// Opaque call data.
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Compute the transaction id (BLAKE3 of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, ChainError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ChainError::Encoding(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }
}

/// Block header: parent link, height, and commitments.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Network the block belongs to.
    pub chain_id: u32,
    /// Hash of the parent block. Zero for genesis.
    pub parent_hash: Hash256,
    /// Distance from genesis.
    pub height: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Pubkey hash credited for producing the block.
    pub coinbase: Hash256,
    /// Root of the account state after this block.
    pub state_root: Hash256,
    /// Merkle root over the block's transaction ids.
    pub txs_root: Hash256,
    /// Producer nonce.
    pub nonce: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing.
    const HASH_SIZE: usize = 4 * 8 + 4 + 4 * 32;

    /// Compute the block hash (double SHA-256).
    ///
    /// Fixed byte layout: version || chain_id || parent_hash || height ||
    /// timestamp || coinbase || state_root || txs_root || nonce, integers
    /// little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&self.chain_id.to_le_bytes());
        data.extend_from_slice(self.parent_hash.as_bytes());
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(self.coinbase.as_bytes());
        data.extend_from_slice(self.state_root.as_bytes());
        data.extend_from_slice(self.txs_root.as_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header plus transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Block hash, computed from the header.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Transaction ids in block order.
    pub fn txids(&self) -> Result<Vec<Hash256>, ChainError> {
        self.transactions.iter().map(Transaction::txid).collect()
    }

    /// Merkle root recomputed from the transactions.
    pub fn compute_txs_root(&self) -> Result<Hash256, ChainError> {
        Ok(merkle::merkle_root(&self.txids()?))
    }

    /// Serialize for storage.
    pub fn encode(&self) -> Result<Vec<u8>, ChainError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ChainError::Encoding(e.to_string()))
    }

    /// Deserialize a stored block. Trailing bytes are rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        let (block, read): (Self, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| ChainError::Encoding(e.to_string()))?;
        if read != bytes.len() {
            return Err(ChainError::Encoding(format!(
                "{} trailing bytes after block",
                bytes.len() - read
            )));
        }
        Ok(block)
    }
}
