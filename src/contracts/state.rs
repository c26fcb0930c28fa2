//! Contract state interface - provides controlled access to chain state.
//!
//! Contracts interact with the chain through `ContractState`, which:
//! - Exposes the current block (height and time)
//! - Provides keyed storage per contract address
//! - Logs every write so a failed call can be rolled back
//! - Collects emitted events

use std::collections::HashMap;

use crate::crypto::{hash_data, merkle_root, Hash};
use crate::state::{AccountState, Storage};
use crate::types::{Address, Timestamp};

use super::{ContractError, ContractEvent, ContractResult};

/// Block the current call executes in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    /// Block height
    pub height: u64,
    /// Block time in seconds
    pub timestamp: Timestamp,
}

#[derive(Debug)]
enum StorageHandle<'a> {
    Mutable(&'a mut Storage),
    ReadOnly(&'a Storage),
}

impl StorageHandle<'_> {
    fn get(&self) -> &Storage {
        match self {
            Self::Mutable(s) => &**s,
            Self::ReadOnly(s) => *s,
        }
    }
}

/// State interface for contract execution
#[derive(Debug)]
pub struct ContractState<'a> {
    accounts: &'a HashMap<Address, AccountState>,
    storage: StorageHandle<'a>,
    block: BlockContext,
    /// Pending storage writes (for rollback)
    mutations: Vec<StateMutation>,
    /// Events emitted during execution
    events: Vec<ContractEvent>,
}

/// A storage write that can be rolled back
#[derive(Clone, Debug)]
struct StateMutation {
    contract: Address,
    key: Vec<u8>,
    /// Value before the write, `None` if the key was absent
    old_value: Option<Vec<u8>>,
}

impl<'a> ContractState<'a> {
    /// Create a writable state wrapper
    #[must_use]
    pub fn new(
        accounts: &'a HashMap<Address, AccountState>,
        storage: &'a mut Storage,
        block: BlockContext,
    ) -> Self {
        Self {
            accounts,
            storage: StorageHandle::Mutable(storage),
            block,
            mutations: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Create a read-only view for queries
    #[must_use]
    pub fn view(
        accounts: &'a HashMap<Address, AccountState>,
        storage: &'a Storage,
        block: BlockContext,
    ) -> Self {
        Self {
            accounts,
            storage: StorageHandle::ReadOnly(storage),
            block,
            mutations: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Current block
    #[must_use]
    pub fn block(&self) -> BlockContext {
        self.block
    }

    /// Current block time
    #[must_use]
    pub fn block_time(&self) -> Timestamp {
        self.block.timestamp
    }

    fn storage_mut(&mut self) -> ContractResult<&mut Storage> {
        match &mut self.storage {
            StorageHandle::Mutable(s) => Ok(&mut **s),
            StorageHandle::ReadOnly(_) => Err(ContractError::ExecutionFailed(
                "state is read-only".to_string(),
            )),
        }
    }

    /// Read from contract storage
    #[must_use]
    pub fn storage_read(&self, contract: &Address, key: &[u8]) -> Option<Vec<u8>> {
        self.storage.get().get(&(*contract, key.to_vec())).cloned()
    }

    /// Check whether a storage key exists
    #[must_use]
    pub fn storage_contains(&self, contract: &Address, key: &[u8]) -> bool {
        self.storage.get().contains_key(&(*contract, key.to_vec()))
    }

    /// Write to contract storage
    ///
    /// # Errors
    /// Fails on a read-only view
    pub fn storage_write(
        &mut self,
        contract: Address,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> ContractResult<()> {
        let old_value = self.storage_mut()?.insert((contract, key.clone()), value);
        self.mutations.push(StateMutation {
            contract,
            key,
            old_value,
        });
        Ok(())
    }

    /// Delete from contract storage
    ///
    /// # Errors
    /// Fails on a read-only view
    pub fn storage_delete(&mut self, contract: Address, key: Vec<u8>) -> ContractResult<()> {
        let old_value = self.storage_mut()?.remove(&(contract, key.clone()));
        if old_value.is_some() {
            self.mutations.push(StateMutation {
                contract,
                key,
                old_value,
            });
        }
        Ok(())
    }

    /// Emit an event
    pub fn emit_event(&mut self, event: ContractEvent) {
        self.events.push(event);
    }

    /// Get all emitted events
    #[must_use]
    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Commit all pending mutations
    ///
    /// Writes are applied eagerly, so this only drops the undo log.
    pub fn commit(&mut self) {
        self.mutations.clear();
    }

    /// Rollback all pending mutations and discard events
    pub fn rollback(&mut self) {
        let mutations: Vec<StateMutation> = self.mutations.drain(..).collect();
        if let StorageHandle::Mutable(storage) = &mut self.storage {
            for StateMutation {
                contract,
                key,
                old_value,
            } in mutations.into_iter().rev()
            {
                match old_value {
                    Some(old) => {
                        storage.insert((contract, key), old);
                    }
                    None => {
                        storage.remove(&(contract, key));
                    }
                }
            }
        }
        self.events.clear();
    }

    /// Compute state root hash over accounts and storage
    #[must_use]
    pub fn compute_state_root(&self) -> Hash {
        state_root(self.accounts, self.storage.get())
    }
}

/// Deterministic root over account nonces and contract storage
#[must_use]
pub fn state_root(accounts: &HashMap<Address, AccountState>, storage: &Storage) -> Hash {
    let mut hashes: Vec<Hash> = accounts
        .iter()
        .map(|(addr, account)| {
            let mut data = Vec::with_capacity(28);
            data.extend_from_slice(addr.as_bytes());
            data.extend_from_slice(&account.nonce.to_le_bytes());
            hash_data(&data)
        })
        .chain(storage.iter().map(|((contract, key), value)| {
            let mut data = Vec::with_capacity(20 + 8 + key.len() + value.len());
            data.extend_from_slice(contract.as_bytes());
            data.extend_from_slice(&(key.len() as u64).to_le_bytes());
            data.extend_from_slice(key);
            data.extend_from_slice(value);
            hash_data(&data)
        }))
        .collect();

    hashes.sort();
    merkle_root(&hashes)
}
