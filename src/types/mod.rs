//! Core value types shared by the runtime, contracts and clients.

mod address;
mod amount;
mod block;

pub use address::{Address, AddressError};
pub use amount::{AmountError, TokenAmount, TOKEN_DECIMALS};
pub use block::{Block, BlockHeader};

use crate::crypto::Hash;

/// Identifier for contracts, transactions and blocks
pub type Id = Hash;

/// Block time in seconds since the Unix epoch
pub type Timestamp = u64;

/// Current wall-clock time in seconds
#[must_use]
pub fn now_secs() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as Timestamp
}
