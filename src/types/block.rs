//! Blocks mined by the local chain.
//!
//! Every transaction is mined in its own block, so a block commits to exactly
//! one transaction id together with the resulting state root.

use serde::{Deserialize, Serialize};

use super::{Id, Timestamp};
use crate::crypto::{hash_data, Hash};

/// Block header containing metadata and commitments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number (height)
    pub height: u64,
    /// Hash of the previous block
    pub parent_hash: Hash,
    /// State root after applying the block
    pub state_root: Hash,
    /// Block time
    pub timestamp: Timestamp,
    /// Transaction included in this block
    pub tx_id: Id,
}

impl BlockHeader {
    /// Compute the block hash
    #[must_use]
    pub fn compute_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(self.parent_hash.as_bytes());
        data.extend_from_slice(self.state_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(self.tx_id.as_bytes());

        hash_data(&data)
    }
}

/// A mined block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// Block hash (computed from header)
    pub hash: Hash,
}

impl Block {
    /// Seal a header into a block
    #[must_use]
    pub fn new(header: BlockHeader) -> Self {
        let hash = header.compute_hash();
        Self { header, hash }
    }

    /// The genesis block at the given time
    #[must_use]
    pub fn genesis(timestamp: Timestamp) -> Self {
        Self::new(BlockHeader {
            height: 0,
            parent_hash: Hash::ZERO,
            state_root: Hash::ZERO,
            timestamp,
            tx_id: Hash::ZERO,
        })
    }

    /// Check that the hash matches the header
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.header.compute_hash() == self.hash
    }
}
