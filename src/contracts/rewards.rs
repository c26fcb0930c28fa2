//! Rewards Contract - epoch-based reward distribution.
//!
//! The lending contract reports supplied balances through `Supply` and
//! `Withdraw`; participants `Claim` matured reward, which is paid in the
//! reward token from the contract's own balance (the reward pool).
//!
//! All accounting is delegated to [`RewardLedger`], stored bincode-encoded in
//! the contract's storage between calls.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contracts::state::ContractState;
use crate::contracts::token;
use crate::contracts::transaction::ContractTransaction;
use crate::contracts::{
    decode, encode, Contract, ContractError, ContractEvent, ContractResult, ExecutionResult,
};
use crate::crypto::Hash;
use crate::tokenomics::{LedgerData, LedgerError, RewardLedger, RewardParams, UserInfo};
use crate::types::{Address, Timestamp, TokenAmount};

/// Code marker the native loader maps to `RewardsContract`
pub const REWARDS_CODE: &[u8] = b"native:rewards";

const KEY_CONFIG: &[u8] = b"rewards:config";
const KEY_LEDGER: &[u8] = b"rewards:ledger";

impl From<LedgerError> for ContractError {
    fn from(e: LedgerError) -> Self {
        Self::Reverted(e.to_string())
    }
}

/// Constructor arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsInit {
    /// Reward released per epoch
    pub reward_per_epoch: TokenAmount,
    /// Epoch length in seconds
    pub epoch_duration: u64,
    /// Release window at the start of each epoch, in seconds
    pub reward_duration: u64,
    /// Address allowed to supply and withdraw
    pub lending_contract: Address,
    /// Token paid out on claims
    pub reward_token: Address,
}

/// State-changing calls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RewardsCall {
    /// Record a supplied balance (lending contract only)
    Supply {
        /// Participant
        account: Address,
        /// Amount supplied
        amount: TokenAmount,
    },
    /// Reduce a supplied balance (lending contract only)
    Withdraw {
        /// Participant
        account: Address,
        /// Amount withdrawn
        amount: TokenAmount,
    },
    /// Pay the caller's matured reward
    Claim,
    /// Replace the epoch parameters (owner only)
    SetParameters {
        /// New reward per epoch
        reward_per_epoch: TokenAmount,
        /// New epoch length
        epoch_duration: u64,
        /// New release window
        reward_duration: u64,
    },
}

/// Read-only queries
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RewardsQuery {
    /// -> `TokenAmount`
    RewardPerEpoch,
    /// -> `RewardData`
    GetData,
    /// Claimable now -> `TokenAmount`
    AvailableReward(Address),
    /// -> `Vec<UserInfo>`
    UserInfo(Vec<Address>),
    /// -> `Address`
    Owner,
}

/// Addresses fixed at deployment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Deployer, allowed to set parameters
    pub owner: Address,
    /// See [`RewardsInit::lending_contract`]
    pub lending_contract: Address,
    /// See [`RewardsInit::reward_token`]
    pub reward_token: Address,
}

impl RewardsConfig {
    fn require_lending_contract(&self, caller: Address) -> ContractResult<()> {
        if caller != self.lending_contract {
            return Err(ContractError::Reverted(
                "Caller is not the lending contract".to_string(),
            ));
        }
        Ok(())
    }

    fn require_owner(&self, caller: Address) -> ContractResult<()> {
        if caller != self.owner {
            return Err(ContractError::Reverted("Caller is not the owner".to_string()));
        }
        Ok(())
    }
}

/// Answer to `GetData`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardData {
    /// Ledger aggregates at the query time
    pub ledger: LedgerData,
    /// Contract addresses
    pub config: RewardsConfig,
    /// Reward tokens held by the contract
    pub pool_balance: TokenAmount,
}

/// Payload of the `Supply`, `Withdraw` and `Claim` events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    /// Participant
    pub account: Address,
    /// Amount supplied, withdrawn or claimed
    pub amount: TokenAmount,
    /// Block time
    pub timestamp: Timestamp,
}

/// Payload of the `ParametersSet` event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersSetEvent {
    /// Parameters now in force
    pub params: RewardParams,
    /// Block time the new schedule starts
    pub timestamp: Timestamp,
}

/// Rewards contract, fully storage-backed
#[derive(Clone, Debug)]
pub struct RewardsContract {
    id: Hash,
}

impl RewardsContract {
    /// Create the contract handle for a deployed id
    #[must_use]
    pub fn new(id: Hash) -> Self {
        Self { id }
    }

    fn load_config(&self, state: &ContractState<'_>) -> ContractResult<RewardsConfig> {
        let data = state
            .storage_read(&self.address(), KEY_CONFIG)
            .ok_or_else(|| ContractError::ExecutionFailed("Rewards not initialized".to_string()))?;
        decode(&data)
    }

    fn load_ledger(&self, state: &ContractState<'_>) -> ContractResult<RewardLedger> {
        let data = state
            .storage_read(&self.address(), KEY_LEDGER)
            .ok_or_else(|| ContractError::ExecutionFailed("Rewards not initialized".to_string()))?;
        decode(&data)
    }

    fn save_ledger(&self, state: &mut ContractState<'_>, ledger: &RewardLedger) -> ContractResult<()> {
        state.storage_write(self.address(), KEY_LEDGER.to_vec(), encode(ledger)?)
    }

    fn emit(&self, state: &mut ContractState<'_>, topic: &str, data: Vec<u8>) {
        state.emit_event(ContractEvent {
            contract_id: self.id,
            topic: topic.to_string(),
            data,
        });
    }

    fn emit_reward_event(
        &self,
        state: &mut ContractState<'_>,
        topic: &str,
        account: Address,
        amount: TokenAmount,
    ) -> ContractResult<()> {
        let event = RewardEvent {
            account,
            amount,
            timestamp: state.block_time(),
        };
        self.emit(state, topic, encode(&event)?);
        Ok(())
    }

    /// Pay the caller's matured reward out of the pool
    fn execute_claim(
        &self,
        state: &mut ContractState<'_>,
        config: &RewardsConfig,
        ledger: &mut RewardLedger,
        caller: Address,
    ) -> ContractResult<TokenAmount> {
        let amount = ledger.claim(caller, state.block_time())?;

        let pool = token::balance_of(state, &config.reward_token, &self.address())?;
        if pool < amount {
            return Err(ContractError::Reverted("Insufficient reward pool".to_string()));
        }
        token::transfer(state, config.reward_token, self.address(), caller, amount)?;

        self.emit_reward_event(state, "Claim", caller, amount)?;
        Ok(amount)
    }

    fn execute_set_parameters(
        &self,
        state: &mut ContractState<'_>,
        ledger: &mut RewardLedger,
        params: RewardParams,
    ) -> ContractResult<()> {
        let timestamp = state.block_time();
        ledger.set_parameters(params, timestamp)?;
        self.emit(
            state,
            "ParametersSet",
            encode(&ParametersSetEvent { params, timestamp })?,
        );
        Ok(())
    }

    fn reward_data(&self, state: &ContractState<'_>) -> ContractResult<RewardData> {
        let config = self.load_config(state)?;
        let ledger = self.load_ledger(state)?;
        Ok(RewardData {
            ledger: ledger.data(state.block_time())?,
            pool_balance: token::balance_of(state, &config.reward_token, &self.address())?,
            config,
        })
    }
}

impl Contract for RewardsContract {
    fn id(&self) -> Hash {
        self.id
    }

    fn name(&self) -> &str {
        "Rewards"
    }

    fn version(&self) -> u32 {
        1
    }

    fn on_deploy(
        &self,
        state: &mut ContractState<'_>,
        deployer: Address,
        init_data: &[u8],
    ) -> ContractResult<()> {
        let init: RewardsInit = decode(init_data)?;
        let params = RewardParams::new(
            init.reward_per_epoch,
            init.epoch_duration,
            init.reward_duration,
        )?;

        if init.lending_contract.is_zero() {
            return Err(ContractError::Reverted(
                "Lending contract is the zero address".to_string(),
            ));
        }
        if !token::is_token(state, &init.reward_token) {
            return Err(ContractError::Reverted(format!(
                "Reward token {} is not a deployed token",
                init.reward_token
            )));
        }

        let config = RewardsConfig {
            owner: deployer,
            lending_contract: init.lending_contract,
            reward_token: init.reward_token,
        };
        state.storage_write(self.address(), KEY_CONFIG.to_vec(), encode(&config)?)?;

        let ledger = RewardLedger::new(params, state.block_time())?;
        self.save_ledger(state, &ledger)
    }

    fn execute(
        &self,
        state: &mut ContractState<'_>,
        tx: &ContractTransaction,
    ) -> ContractResult<ExecutionResult> {
        let call: RewardsCall = decode(&tx.input)
            .map_err(|e| ContractError::InvalidTransaction(format!("Failed to parse call: {e}")))?;

        let config = self.load_config(state)?;
        let mut ledger = self.load_ledger(state)?;
        let now = state.block_time();
        let caller = tx.sender_address;

        let output = match call {
            RewardsCall::Supply { account, amount } => {
                config.require_lending_contract(caller)?;
                ledger.supply(account, amount, now)?;
                self.emit_reward_event(state, "Supply", account, amount)?;
                Vec::new()
            }
            RewardsCall::Withdraw { account, amount } => {
                config.require_lending_contract(caller)?;
                ledger.withdraw(account, amount, now)?;
                self.emit_reward_event(state, "Withdraw", account, amount)?;
                Vec::new()
            }
            RewardsCall::Claim => {
                let amount = self.execute_claim(state, &config, &mut ledger, caller)?;
                debug!(account = %caller, amount = %amount, "Reward claimed");
                encode(&amount)?
            }
            RewardsCall::SetParameters {
                reward_per_epoch,
                epoch_duration,
                reward_duration,
            } => {
                config.require_owner(caller)?;
                let params = RewardParams {
                    reward_per_epoch,
                    epoch_duration,
                    reward_duration,
                };
                self.execute_set_parameters(state, &mut ledger, params)?;
                Vec::new()
            }
        };

        self.save_ledger(state, &ledger)?;
        Ok(ExecutionResult::from_state(state, output))
    }

    fn query(&self, state: &ContractState<'_>, input: &[u8]) -> ContractResult<Vec<u8>> {
        let query: RewardsQuery = decode(input)?;
        let now = state.block_time();
        match query {
            RewardsQuery::RewardPerEpoch => {
                encode(&self.load_ledger(state)?.params().reward_per_epoch)
            }
            RewardsQuery::GetData => encode(&self.reward_data(state)?),
            RewardsQuery::AvailableReward(account) => {
                encode(&self.load_ledger(state)?.available_reward(&account, now)?)
            }
            RewardsQuery::UserInfo(accounts) => {
                let info: Vec<UserInfo> = self.load_ledger(state)?.user_info(&accounts, now)?;
                encode(&info)
            }
            RewardsQuery::Owner => encode(&self.load_config(state)?.owner),
        }
    }
}
