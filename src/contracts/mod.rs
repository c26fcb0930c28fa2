//! Smart contract execution framework.
//!
//! Contracts are native Rust programs executed against the world state.
//! Every call is atomic: a contract either returns an `ExecutionResult` and
//! its state changes are committed, or it returns an error and every write it
//! made is rolled back.
//!
//! ## Architecture
//!
//! 1. **Contracts**: implement the `Contract` trait
//! 2. **Transactions**: signed calls carrying bincode-encoded input
//! 3. **State**: `ContractState` mediates all reads and writes
//! 4. **Registry**: deployed contracts by id, rebuilt from stored code

pub mod loader;
pub mod processor;
pub mod rewards;
pub mod state;
pub mod token;
pub mod transaction;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::Hash;
use crate::types::{Address, Id};

use self::state::ContractState;
use self::transaction::ContractTransaction;

/// Result type for contract operations
pub type ContractResult<T> = Result<T, ContractError>;

/// A smart contract that can be executed on-chain
pub trait Contract: Send + Sync {
    /// Unique contract ID (hash of code, deployer and nonce)
    fn id(&self) -> Id;

    /// Human-readable contract name
    fn name(&self) -> &str;

    /// Contract version
    fn version(&self) -> u32;

    /// Address holding the contract's storage and tokens
    fn address(&self) -> Address {
        Address::from_contract_id(&self.id())
    }

    /// Execute a transaction against this contract
    ///
    /// # Atomicity
    /// Either all state changes succeed or all fail. The processor rolls back
    /// on any error.
    ///
    /// # Errors
    /// Returns error if the call is invalid or reverts
    fn execute(
        &self,
        state: &mut ContractState<'_>,
        tx: &ContractTransaction,
    ) -> ContractResult<ExecutionResult>;

    /// Answer a read-only query
    ///
    /// # Errors
    /// Returns error if the query cannot be decoded or answered
    fn query(&self, state: &ContractState<'_>, input: &[u8]) -> ContractResult<Vec<u8>>;

    /// Hook called once when the contract is deployed
    fn on_deploy(
        &self,
        _state: &mut ContractState<'_>,
        _deployer: Address,
        _init_data: &[u8],
    ) -> ContractResult<()> {
        Ok(())
    }
}

/// Result of contract execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// New state root after execution
    pub new_state_root: Hash,
    /// Events emitted during execution
    pub events: Vec<ContractEvent>,
    /// Output data (bincode)
    pub output: Vec<u8>,
}

impl ExecutionResult {
    /// Build a result from the state after a successful call
    #[must_use]
    pub fn from_state(state: &ContractState<'_>, output: Vec<u8>) -> Self {
        Self {
            new_state_root: state.compute_state_root(),
            events: state.events().to_vec(),
            output,
        }
    }

    /// First event with the given topic
    #[must_use]
    pub fn event(&self, topic: &str) -> Option<&ContractEvent> {
        self.events.iter().find(|e| e.topic == topic)
    }
}

/// Events emitted by contracts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    /// Contract that emitted the event
    pub contract_id: Id,
    /// Event topic (for indexing/filtering)
    pub topic: String,
    /// Event data (bincode)
    pub data: Vec<u8>,
}

impl ContractEvent {
    /// Decode the event payload
    ///
    /// # Errors
    /// Returns error if the payload does not match `T`
    pub fn decode<T: DeserializeOwned>(&self) -> ContractResult<T> {
        decode(&self.data)
    }
}

/// Contract execution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// Contract not found
    #[error("contract not found: {0}")]
    NotFound(Id),

    /// Transaction validation failed
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Contract logic rejected the call; carries the revert reason
    #[error("reverted: {0}")]
    Reverted(String),

    /// Runtime failure unrelated to contract logic
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// State root mismatch
    #[error("state root mismatch: expected {expected}, got {got}")]
    StateRootMismatch {
        /// Expected state root
        expected: Hash,
        /// Actual state root
        got: Hash,
    },

    /// Encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ContractError {
    /// Revert reason, if the contract reverted
    #[must_use]
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Reverted(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Encode a value for contract input, output, storage or events
///
/// # Errors
/// Returns `Serialization` if bincode fails
pub fn encode<T: Serialize + ?Sized>(value: &T) -> ContractResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ContractError::Serialization(e.to_string()))
}

/// Decode a value produced by [`encode`]
///
/// # Errors
/// Returns `Serialization` if the bytes don't decode as `T`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ContractResult<T> {
    bincode::deserialize(bytes).map_err(|e| ContractError::Serialization(e.to_string()))
}

/// Registry of deployed contracts
///
/// Note: Cannot derive Clone or Debug because it contains trait objects
#[derive(Default)]
pub struct ContractRegistry {
    contracts: std::collections::HashMap<Id, Box<dyn Contract>>,
}

impl ContractRegistry {
    /// Create new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            contracts: std::collections::HashMap::new(),
        }
    }

    /// Register a contract
    pub fn register(&mut self, contract: Box<dyn Contract>) {
        let id = contract.id();
        self.contracts.insert(id, contract);
    }

    /// Get contract by ID
    #[must_use]
    pub fn get(&self, id: &Id) -> Option<&dyn Contract> {
        self.contracts.get(id).map(std::convert::AsRef::as_ref)
    }

    /// Check if contract exists
    #[must_use]
    pub fn contains(&self, id: &Id) -> bool {
        self.contracts.contains_key(id)
    }

    /// List all contract IDs
    #[must_use]
    pub fn list(&self) -> Vec<Id> {
        self.contracts.keys().copied().collect()
    }

    /// Get number of registered contracts
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }
}
