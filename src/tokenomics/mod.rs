//! Reward economics: the epoch schedule and the pro-rata reward ledger.
//!
//! Everything here is pure accounting over block time. No tokens move in
//! this module; the `Rewards` contract turns ledger decisions into token
//! transfers.

mod ledger;
mod schedule;

pub use ledger::{LedgerData, RewardLedger, UserInfo, ACC_PRECISION};
pub use schedule::{EpochSchedule, RewardParams};

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger errors; the messages are the contract's revert reasons
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No matured reward for the caller
    #[error("Nothing to claim")]
    NothingToClaim,

    /// Zero supply or withdraw
    #[error("Amount must be positive")]
    ZeroAmount,

    /// Withdraw larger than the supplied balance
    #[error("Insufficient supplied balance")]
    InsufficientBalance,

    /// Epoch parameters rejected
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Reward arithmetic left the representable range
    #[error("Reward arithmetic overflow")]
    Overflow,
}
