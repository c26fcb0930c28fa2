//! World state: accounts, contract storage and deployed code.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{Address, Id};

/// Contract storage keyed by (contract address, key)
pub type Storage = HashMap<(Address, Vec<u8>), Vec<u8>>;

/// Per-account metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Number of transactions executed by this account
    pub nonce: u64,
}

impl AccountState {
    /// Nonce expected on the next transaction
    #[must_use]
    pub fn next_nonce(&self) -> u64 {
        self.nonce + 1
    }
}

/// Everything the chain persists between transactions
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Account nonces
    pub accounts: HashMap<Address, AccountState>,
    /// Contract storage
    pub storage: Storage,
    /// Deployed contract code by contract id
    pub contracts: BTreeMap<Id, Vec<u8>>,
}

impl WorldState {
    /// Create empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Nonce expected on the next transaction from `address`
    #[must_use]
    pub fn next_nonce(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map_or(1, AccountState::next_nonce)
    }

    /// Record that `address` executed a transaction
    pub fn bump_nonce(&mut self, address: Address) {
        self.accounts.entry(address).or_default().nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_tracking() {
        let mut world = WorldState::new();
        let addr = Address::from_bytes([7; 20]);

        assert_eq!(world.next_nonce(&addr), 1);
        world.bump_nonce(addr);
        world.bump_nonce(addr);
        assert_eq!(world.next_nonce(&addr), 3);
    }
}
