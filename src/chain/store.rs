//! sled-backed persistence for the local chain.
//!
//! Layout:
//! - `meta` tree: `world` (bincode `WorldState`), `time_offset` (u64 BE),
//!   `alias:<name>` (contract id)
//! - `blocks` tree: height (u64 BE) -> bincode `Block`

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChainError, ChainResult};
use crate::crypto::Hash;
use crate::state::WorldState;
use crate::types::{Block, Id};

const TREE_META: &str = "meta";
const TREE_BLOCKS: &str = "blocks";
const KEY_WORLD: &[u8] = b"world";
const KEY_TIME_OFFSET: &[u8] = b"time_offset";
const ALIAS_PREFIX: &str = "alias:";

/// Everything needed to resume a chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// World state after the last block
    pub world: WorldState,
    /// Mined blocks, genesis first
    pub blocks: Vec<Block>,
    /// Seconds added to the clock by `increase_time`
    pub time_offset: u64,
}

/// Chain database
pub struct ChainStore {
    meta: sled::Tree,
    blocks: sled::Tree,
    db: sled::Db,
}

impl ChainStore {
    /// Open or create the store at `path`
    ///
    /// # Errors
    /// Returns error if the database cannot be opened
    pub fn open<P: AsRef<Path>>(path: P) -> ChainResult<Self> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened chain store");
        Self::from_db(db)
    }

    /// Store that lives only as long as the process
    ///
    /// # Errors
    /// Returns error if the database cannot be created
    pub fn temporary() -> ChainResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> ChainResult<Self> {
        Ok(Self {
            meta: db.open_tree(TREE_META)?,
            blocks: db.open_tree(TREE_BLOCKS)?,
            db,
        })
    }

    /// Persist a snapshot, replacing the previous one
    ///
    /// # Errors
    /// Returns error on database or encoding failure
    pub fn save(&self, snapshot: &ChainSnapshot) -> ChainResult<()> {
        self.meta.insert(KEY_WORLD, bincode::serialize(&snapshot.world)?)?;
        self.meta
            .insert(KEY_TIME_OFFSET, snapshot.time_offset.to_be_bytes().to_vec())?;

        for block in &snapshot.blocks {
            self.blocks.insert(
                block.header.height.to_be_bytes(),
                bincode::serialize(block)?,
            )?;
        }
        // drop blocks past the snapshot's head
        let next = snapshot.blocks.len() as u64;
        for key in self.blocks.range(next.to_be_bytes()..).keys() {
            self.blocks.remove(key?)?;
        }

        self.db.flush()?;
        debug!(blocks = snapshot.blocks.len(), "Saved chain snapshot");
        Ok(())
    }

    /// Load the stored snapshot, `None` for an empty store
    ///
    /// # Errors
    /// Returns error on database failure or undecodable data
    pub fn load(&self) -> ChainResult<Option<ChainSnapshot>> {
        let Some(world) = self.meta.get(KEY_WORLD)? else {
            return Ok(None);
        };
        let world: WorldState = bincode::deserialize(&world)?;

        let time_offset = match self.meta.get(KEY_TIME_OFFSET)? {
            Some(bytes) => u64::from_be_bytes(
                bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| ChainError::Corrupt("time offset is not 8 bytes".to_string()))?,
            ),
            None => 0,
        };

        let blocks = self
            .blocks
            .iter()
            .values()
            .map(|value| Ok(bincode::deserialize::<Block>(&value?)?))
            .collect::<ChainResult<Vec<_>>>()?;

        Ok(Some(ChainSnapshot {
            world,
            blocks,
            time_offset,
        }))
    }

    /// Remember a contract id under a name
    ///
    /// # Errors
    /// Returns error on database failure
    pub fn set_alias(&self, name: &str, contract_id: &Id) -> ChainResult<()> {
        self.meta
            .insert(format!("{ALIAS_PREFIX}{name}"), contract_id.as_bytes().to_vec())?;
        self.db.flush()?;
        Ok(())
    }

    /// Contract id stored under `name`
    ///
    /// # Errors
    /// Returns error on database failure or a malformed id
    pub fn alias(&self, name: &str) -> ChainResult<Option<Id>> {
        self.meta
            .get(format!("{ALIAS_PREFIX}{name}"))?
            .map(|bytes| {
                let bytes: [u8; 32] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| ChainError::Corrupt(format!("alias {name} is not a hash")))?;
                Ok(Hash::from_bytes(bytes))
            })
            .transpose()
    }
}
