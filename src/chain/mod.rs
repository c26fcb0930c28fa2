//! Local development chain.
//!
//! A single-node chain that mines one block per transaction. Block time comes
//! from a [`Clock`] plus an offset that `increase_time` pushes forward, so
//! tests and the CLI can move through epochs without waiting.

mod store;

pub use store::{ChainSnapshot, ChainStore};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::contracts::processor::TransactionProcessor;
use crate::contracts::state::{state_root, BlockContext};
use crate::contracts::transaction::{ContractTransaction, DeployTransaction, TransactionKind};
use crate::contracts::{decode, ContractError, ExecutionResult};
use crate::crypto::Keypair;
use crate::state::WorldState;
use crate::types::{now_secs, Address, Block, BlockHeader, Id, Timestamp};

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Chain and chain store errors
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The transaction was rejected or reverted
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// sled failure
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// bincode failure
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// The store holds data this version cannot read
    #[error("corrupt chain store: {0}")]
    Corrupt(String),

    /// Time offset left the representable range
    #[error("time offset overflow")]
    TimeOverflow,
}

impl ChainError {
    /// Revert reason, if the transaction reverted
    #[must_use]
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Contract(e) => e.revert_reason(),
            _ => None,
        }
    }
}

/// Source of wall-clock time for block timestamps
pub trait Clock: Send + Sync {
    /// Current time in seconds
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now_secs()
    }
}

/// Clock that only moves when told to; clones share the same time
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Clock stopped at `start`
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    /// Move the clock forward by `secs`
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock
    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a mined transaction
#[derive(Clone, Debug)]
pub struct Receipt {
    /// Block the transaction was mined in
    pub block: Block,
    /// Transaction id
    pub tx_id: Id,
    /// Contract output and events
    pub result: ExecutionResult,
}

/// Single-node chain with a controllable clock
pub struct LocalChain {
    world: WorldState,
    processor: TransactionProcessor,
    clock: Box<dyn Clock>,
    time_offset: u64,
    blocks: Vec<Block>,
}

impl LocalChain {
    /// Start a fresh chain whose genesis block is at the clock's time
    #[must_use]
    pub fn new(clock: Box<dyn Clock>) -> Self {
        let genesis = Block::genesis(clock.now());
        Self {
            world: WorldState::new(),
            processor: TransactionProcessor::new(),
            clock,
            time_offset: 0,
            blocks: vec![genesis],
        }
    }

    /// Fresh chain on system time
    #[must_use]
    pub fn with_system_clock() -> Self {
        Self::new(Box::new(SystemClock))
    }

    /// Resume a chain from a snapshot
    ///
    /// # Errors
    /// Returns error if the snapshot has no blocks or holds unknown code
    pub fn from_snapshot(snapshot: ChainSnapshot, clock: Box<dyn Clock>) -> ChainResult<Self> {
        if snapshot.blocks.is_empty() {
            return Err(ChainError::Corrupt("snapshot has no genesis block".to_string()));
        }
        let mut processor = TransactionProcessor::new();
        processor.rebuild_registry(&snapshot.world)?;

        Ok(Self {
            world: snapshot.world,
            processor,
            clock,
            time_offset: snapshot.time_offset,
            blocks: snapshot.blocks,
        })
    }

    /// Copy of everything needed to resume the chain
    #[must_use]
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            world: self.world.clone(),
            blocks: self.blocks.clone(),
            time_offset: self.time_offset,
        }
    }

    /// Latest block
    #[must_use]
    pub fn head(&self) -> &Block {
        // never empty: constructors start with a genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    /// All mined blocks, genesis first
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Current world state
    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Time the next block would get
    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.clock
            .now()
            .saturating_add(self.time_offset)
            .max(self.head().header.timestamp)
    }

    /// Push block time forward by `secs`; returns the new chain time
    ///
    /// # Errors
    /// Returns `TimeOverflow` if the offset overflows
    pub fn increase_time(&mut self, secs: u64) -> ChainResult<Timestamp> {
        self.time_offset = self
            .time_offset
            .checked_add(secs)
            .ok_or(ChainError::TimeOverflow)?;
        let now = self.time();
        info!(secs, now, "Increased chain time");
        Ok(now)
    }

    /// Nonce the next transaction from `address` must carry
    #[must_use]
    pub fn next_nonce(&self, address: &Address) -> u64 {
        self.world.next_nonce(address)
    }

    fn pending_block(&self) -> BlockContext {
        BlockContext {
            height: self.head().header.height + 1,
            timestamp: self.time(),
        }
    }

    /// Mine `tx` into a new block
    ///
    /// A transaction that consumed its nonce is mined even when it reverts;
    /// its state changes are discarded and the revert is returned.
    ///
    /// # Errors
    /// Returns `Contract` if the transaction is rejected or reverts
    pub fn submit(&mut self, tx: &TransactionKind) -> ChainResult<Receipt> {
        let block = self.pending_block();
        let sender = tx.sender();
        let nonce_before = self.world.next_nonce(&sender);

        let result = self
            .processor
            .process_transaction(tx, &mut self.world, block);

        if self.world.next_nonce(&sender) == nonce_before {
            // rejected before execution, nothing to mine
            return Err(result.err().unwrap_or_else(|| {
                ContractError::ExecutionFailed("transaction did not consume its nonce".to_string())
            })
            .into());
        }

        let mined = self.mine(block, tx.id());
        match result {
            Ok(result) => {
                debug!(
                    height = mined.header.height,
                    tx_id = %tx.id(),
                    events = result.events.len(),
                    "Mined transaction"
                );
                Ok(Receipt {
                    block: mined,
                    tx_id: tx.id(),
                    result,
                })
            }
            Err(e) => {
                warn!(height = mined.header.height, tx_id = %tx.id(), error = %e, "Transaction reverted");
                Err(e.into())
            }
        }
    }

    fn mine(&mut self, context: BlockContext, tx_id: Id) -> Block {
        let block = Block::new(BlockHeader {
            height: context.height,
            parent_hash: self.head().hash,
            state_root: state_root(&self.world.accounts, &self.world.storage),
            timestamp: context.timestamp,
            tx_id,
        });
        self.blocks.push(block.clone());
        block
    }

    /// Deploy native `code` signed by `keypair`; returns the contract id
    ///
    /// # Errors
    /// Returns error if the deployment is rejected or its constructor reverts
    pub fn deploy(
        &mut self,
        keypair: &Keypair,
        code: &[u8],
        init_data: Vec<u8>,
    ) -> ChainResult<(Id, Receipt)> {
        let nonce = self.next_nonce(&Address::from_public_key(keypair.public_key()));
        let tx = DeployTransaction::signed(code.to_vec(), init_data, keypair, nonce);
        let receipt = self.submit(&TransactionKind::Deploy(tx))?;
        let contract_id: Id = decode(&receipt.result.output)?;
        Ok((contract_id, receipt))
    }

    /// Call `contract_id` with `input`, signed by `keypair`
    ///
    /// # Errors
    /// Returns error if the call is rejected or reverts
    pub fn execute(
        &mut self,
        keypair: &Keypair,
        contract_id: Id,
        input: Vec<u8>,
    ) -> ChainResult<Receipt> {
        let nonce = self.next_nonce(&Address::from_public_key(keypair.public_key()));
        let tx = ContractTransaction::signed(contract_id, keypair, input, nonce);
        self.submit(&TransactionKind::Execute(tx))
    }

    /// Read-only query evaluated at the pending block time
    ///
    /// # Errors
    /// Returns error if the contract is unknown or the query fails
    pub fn query(&self, contract_id: &Id, input: &[u8]) -> ChainResult<Vec<u8>> {
        Ok(self
            .processor
            .query(contract_id, input, &self.world, self.pending_block())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::encode;
    use crate::contracts::token::{TokenCall, TokenInit, TokenQuery, TOKEN_CODE};
    use crate::types::TokenAmount;

    const T0: Timestamp = 1_700_000_000;

    fn token_init() -> Vec<u8> {
        encode(&TokenInit {
            name: "Reward".to_string(),
            symbol: "RWD".to_string(),
            initial_supply: TokenAmount::from_tokens(1_000),
        })
        .unwrap()
    }

    #[test]
    fn test_one_block_per_transaction() {
        let clock = ManualClock::new(T0);
        let mut chain = LocalChain::new(Box::new(clock));
        let kp = Keypair::generate();

        let (token, receipt) = chain.deploy(&kp, TOKEN_CODE, token_init()).unwrap();
        assert_eq!(receipt.block.header.height, 1);
        assert_eq!(chain.head().header.parent_hash, chain.blocks()[0].hash);

        let input = encode(&TokenCall::Transfer {
            to: Address::from_bytes([3; 20]),
            amount: TokenAmount::from_tokens(1),
        })
        .unwrap();
        let receipt = chain.execute(&kp, token, input).unwrap();
        assert_eq!(receipt.block.header.height, 2);
        assert!(chain.blocks().iter().all(Block::is_sealed));
    }

    #[test]
    fn test_increase_time() {
        let clock = ManualClock::new(T0);
        let mut chain = LocalChain::new(Box::new(clock.clone()));
        assert_eq!(chain.time(), T0);

        assert_eq!(chain.increase_time(604_800).unwrap(), T0 + 604_800);
        clock.advance(5);
        assert_eq!(chain.time(), T0 + 604_805);
    }

    #[test]
    fn test_block_time_never_goes_backwards() {
        let clock = ManualClock::new(T0);
        let mut chain = LocalChain::new(Box::new(clock.clone()));
        let kp = Keypair::generate();
        chain.deploy(&kp, TOKEN_CODE, token_init()).unwrap();

        clock.set(T0 - 100);
        assert_eq!(chain.time(), T0);
    }

    #[test]
    fn test_revert_is_mined_and_consumes_nonce() {
        let mut chain = LocalChain::new(Box::new(ManualClock::new(T0)));
        let kp = Keypair::generate();
        let addr = Address::from_public_key(kp.public_key());
        let (token, _) = chain.deploy(&kp, TOKEN_CODE, token_init()).unwrap();
        let storage_before = chain.world().storage.clone();

        let input = encode(&TokenCall::Transfer {
            to: Address::from_bytes([3; 20]),
            amount: TokenAmount::from_tokens(5_000),
        })
        .unwrap();
        let err = chain.execute(&kp, token, input).unwrap_err();
        assert_eq!(err.revert_reason(), Some("Insufficient token balance"));
        assert_eq!(chain.world().storage, storage_before);
        assert_eq!(chain.next_nonce(&addr), 3);
        assert_eq!(chain.head().header.height, 2);
    }

    #[test]
    fn test_snapshot_resume() {
        let mut chain = LocalChain::new(Box::new(ManualClock::new(T0)));
        let kp = Keypair::generate();
        let (token, _) = chain.deploy(&kp, TOKEN_CODE, token_init()).unwrap();
        chain.increase_time(60).unwrap();

        let resumed =
            LocalChain::from_snapshot(chain.snapshot(), Box::new(ManualClock::new(T0))).unwrap();
        assert_eq!(resumed.head(), chain.head());
        assert_eq!(resumed.time(), T0 + 60);

        let query = encode(&TokenQuery::TotalSupply).unwrap();
        assert_eq!(
            resumed.query(&token, &query).unwrap(),
            chain.query(&token, &query).unwrap()
        );
    }
}
