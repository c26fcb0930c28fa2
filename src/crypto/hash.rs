//! BLAKE3 digests and merkle roots.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CryptoError, CryptoResult};

/// A 32-byte BLAKE3 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// All-zero hash (empty tree root, unset ids)
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create from raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex encoding without prefix
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex (with or without 0x prefix)
    ///
    /// # Errors
    /// Returns error if hex is invalid or not 32 bytes
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHash(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::InvalidHash(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}..)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash arbitrary data with BLAKE3
#[must_use]
pub fn hash_data(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// Compute a binary merkle root over leaf hashes.
///
/// An odd node at the end of a level is promoted unchanged.
#[must_use]
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = blake3::Hasher::new();
                    hasher.update(left.as_bytes());
                    hasher.update(right.as_bytes());
                    Hash(*hasher.finalize().as_bytes())
                }
                // odd node is promoted unchanged
                _ => pair[0],
            })
            .collect();
    }
    level[0]
}
