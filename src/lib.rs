//! # Epoch Rewards
//!
//! Epoch-based reward distribution for a lending protocol.
//!
//! ## Architecture
//!
//! - [`tokenomics`]: the reward ledger. Each epoch releases a fixed reward,
//!   shared pro rata by supplied balance; reward matures when its epoch ends.
//! - [`contracts`]: native contracts (reward token, rewards) executed by a
//!   transaction processor over a contract state with commit/rollback.
//! - [`chain`]: a single-node chain mining one block per transaction, with a
//!   controllable clock and sled persistence.
//! - [`client`]: typed clients that sign, submit and decode contract calls.
//!
//! ## Accounting Model
//!
//! - Claims pay only reward from completed epochs
//! - A claim with nothing matured reverts with "Nothing to claim"
//! - Rounding always favours the pool: paid reward never exceeds emission

#![forbid(unsafe_code)]
#![deny(clippy::all, rust_2018_idioms)]
#![warn(clippy::pedantic, clippy::nursery, missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::too_many_arguments,
    // Intentional numeric casts - amounts and timing are bounded
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    // Const fn not always beneficial for complex types
    clippy::missing_const_for_fn,
    // must_use on every fn is excessive
    clippy::must_use_candidate,
    // Pass by value is fine for small Copy types
    clippy::needless_pass_by_value,
    // Field naming matches domain terminology
    clippy::struct_field_names,
    // Match arms with same body are sometimes clearer separate
    clippy::match_same_arms
)]

pub mod chain;
pub mod client;
pub mod config;
pub mod contracts;
pub mod crypto;
pub mod state;
pub mod tokenomics;
pub mod types;
pub mod wallet;

pub use chain::{ChainError, ChainStore, LocalChain, ManualClock, SystemClock};
pub use client::{RewardsClient, TokenClient};
pub use crypto::{Hash, Keypair, PublicKey, SecretKey, Signature};
pub use tokenomics::{LedgerError, RewardLedger, RewardParams};
pub use types::{Address, Block, BlockHeader, TokenAmount};
pub use wallet::{Wallet, WalletError, WalletInfo};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
