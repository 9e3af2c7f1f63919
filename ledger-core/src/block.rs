//! Block headers and full blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::hash_json;

use crate::merkle::MerkleTree;
use crate::transaction::BlockTx;

/// Everything about a block except its transactions. Hashing a header
/// produces the block's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub beneficiary: String,
    pub difficulty: u16,
    pub mining_reward: i64,
    pub state_root: String,
    pub trans_root: String,
    pub trans_count: u16,
    pub nonce: u64,
}

impl BlockHeader {
    /// SHA-256 of the header's canonical JSON, hex-encoded with `0x`.
    pub fn hash(&self) -> String {
        hash_json(self)
    }
}

/// A mined block: a header plus the ordered transactions it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<BlockTx>,
}

impl Block {
    pub fn hash(&self) -> String {
        self.header.hash()
    }

    /// Builds the transaction Merkle tree from `transactions`, for
    /// recomputing and checking `header.trans_root`.
    pub fn merkle_tree(&self) -> shared::Result<MerkleTree<BlockTx>> {
        MerkleTree::new(self.transactions.clone())
    }
}
