//! Contract Loading Infrastructure
//!
//! Maps deployed code to a contract implementation. Only native contracts
//! exist: their code is a `native:<name>` marker.

use crate::contracts::rewards::{RewardsContract, REWARDS_CODE};
use crate::contracts::token::{TokenContract, TOKEN_CODE};
use crate::contracts::{Contract, ContractError, ContractResult};
use crate::types::Id;

/// A trait for loading contracts from code
pub trait ContractLoader: Send + Sync {
    /// Try to load a contract from code
    fn load(&self, id: Id, code: &[u8]) -> ContractResult<Box<dyn Contract>>;
}

/// Loads the built-in native contracts
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeLoader;

impl NativeLoader {
    /// Create a native loader
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ContractLoader for NativeLoader {
    fn load(&self, id: Id, code: &[u8]) -> ContractResult<Box<dyn Contract>> {
        if code == TOKEN_CODE {
            Ok(Box::new(TokenContract::new(id)))
        } else if code == REWARDS_CODE {
            Ok(Box::new(RewardsContract::new(id)))
        } else {
            Err(ContractError::ExecutionFailed(format!(
                "Unknown native contract: {}",
                String::from_utf8_lossy(code)
            )))
        }
    }
}
