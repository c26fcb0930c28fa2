//! Typed clients for the native contracts.
//!
//! Each client wraps a deployed contract id, encodes calls and queries, signs
//! them with the caller's keypair and decodes the answers.

use crate::chain::{ChainResult, LocalChain, Receipt};
use crate::contracts::rewards::{RewardData, RewardsCall, RewardsInit, RewardsQuery, REWARDS_CODE};
use crate::contracts::token::{TokenCall, TokenInit, TokenMetadata, TokenQuery, TOKEN_CODE};
use crate::contracts::{decode, encode};
use crate::crypto::Keypair;
use crate::tokenomics::{RewardParams, UserInfo};
use crate::types::{Address, Id, TokenAmount};

/// Client for a deployed token contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenClient {
    id: Id,
}

impl TokenClient {
    /// Deploy a token; `owner` receives the initial supply
    ///
    /// # Errors
    /// Returns error if deployment reverts
    pub fn deploy(chain: &mut LocalChain, owner: &Keypair, init: &TokenInit) -> ChainResult<Self> {
        let (id, _) = chain.deploy(owner, TOKEN_CODE, encode(init)?)?;
        Ok(Self { id })
    }

    /// Client for an already deployed token
    #[must_use]
    pub fn at(id: Id) -> Self {
        Self { id }
    }

    /// Contract id
    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Contract address
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_contract_id(&self.id)
    }

    /// Transfer tokens from `from`
    ///
    /// # Errors
    /// Returns error if the transfer reverts
    pub fn transfer(
        &self,
        chain: &mut LocalChain,
        from: &Keypair,
        to: Address,
        amount: TokenAmount,
    ) -> ChainResult<Receipt> {
        chain.execute(from, self.id, encode(&TokenCall::Transfer { to, amount })?)
    }

    /// Mint new tokens (owner only)
    ///
    /// # Errors
    /// Returns error if the caller is not the owner
    pub fn mint(
        &self,
        chain: &mut LocalChain,
        owner: &Keypair,
        to: Address,
        amount: TokenAmount,
    ) -> ChainResult<Receipt> {
        chain.execute(owner, self.id, encode(&TokenCall::Mint { to, amount })?)
    }

    fn ask<T: serde::de::DeserializeOwned>(&self, chain: &LocalChain, query: &TokenQuery) -> ChainResult<T> {
        Ok(decode(&chain.query(&self.id, &encode(query)?)?)?)
    }

    /// Balance of `holder`
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn balance_of(&self, chain: &LocalChain, holder: Address) -> ChainResult<TokenAmount> {
        self.ask(chain, &TokenQuery::BalanceOf(holder))
    }

    /// Token owner
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn owner(&self, chain: &LocalChain) -> ChainResult<Address> {
        self.ask(chain, &TokenQuery::Owner)
    }

    /// Tokens in existence
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn total_supply(&self, chain: &LocalChain) -> ChainResult<TokenAmount> {
        self.ask(chain, &TokenQuery::TotalSupply)
    }

    /// Name, symbol and supply
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn metadata(&self, chain: &LocalChain) -> ChainResult<TokenMetadata> {
        self.ask(chain, &TokenQuery::Metadata)
    }
}

/// Client for a deployed rewards contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardsClient {
    id: Id,
}

impl RewardsClient {
    /// Deploy a rewards contract; the deployer becomes the owner
    ///
    /// # Errors
    /// Returns error if the parameters are invalid or the token is unknown
    pub fn deploy(chain: &mut LocalChain, owner: &Keypair, init: &RewardsInit) -> ChainResult<Self> {
        let (id, _) = chain.deploy(owner, REWARDS_CODE, encode(init)?)?;
        Ok(Self { id })
    }

    /// Client for an already deployed rewards contract
    #[must_use]
    pub fn at(id: Id) -> Self {
        Self { id }
    }

    /// Contract id
    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Contract address; reward tokens sent here fund the pool
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_contract_id(&self.id)
    }

    /// Record `amount` supplied by `account`, signed by the lending contract
    ///
    /// # Errors
    /// Returns error if the caller is not the lending contract
    pub fn supply(
        &self,
        chain: &mut LocalChain,
        lending: &Keypair,
        account: Address,
        amount: TokenAmount,
    ) -> ChainResult<Receipt> {
        chain.execute(lending, self.id, encode(&RewardsCall::Supply { account, amount })?)
    }

    /// Reduce the supplied balance of `account`, signed by the lending contract
    ///
    /// # Errors
    /// Returns error if the caller is not the lending contract or the balance is short
    pub fn withdraw(
        &self,
        chain: &mut LocalChain,
        lending: &Keypair,
        account: Address,
        amount: TokenAmount,
    ) -> ChainResult<Receipt> {
        chain.execute(lending, self.id, encode(&RewardsCall::Withdraw { account, amount })?)
    }

    /// Claim matured reward for `who`; returns the amount paid
    ///
    /// # Errors
    /// Reverts with "Nothing to claim" when no reward has matured
    pub fn claim(&self, chain: &mut LocalChain, who: &Keypair) -> ChainResult<TokenAmount> {
        let receipt = chain.execute(who, self.id, encode(&RewardsCall::Claim)?)?;
        Ok(decode(&receipt.result.output)?)
    }

    /// Replace the epoch parameters (owner only)
    ///
    /// # Errors
    /// Returns error if the caller is not the owner or the parameters are invalid
    pub fn set_parameters(
        &self,
        chain: &mut LocalChain,
        owner: &Keypair,
        params: RewardParams,
    ) -> ChainResult<Receipt> {
        let call = RewardsCall::SetParameters {
            reward_per_epoch: params.reward_per_epoch,
            epoch_duration: params.epoch_duration,
            reward_duration: params.reward_duration,
        };
        chain.execute(owner, self.id, encode(&call)?)
    }

    fn ask<T: serde::de::DeserializeOwned>(&self, chain: &LocalChain, query: &RewardsQuery) -> ChainResult<T> {
        Ok(decode(&chain.query(&self.id, &encode(query)?)?)?)
    }

    /// Reward released per epoch
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn reward_per_epoch(&self, chain: &LocalChain) -> ChainResult<TokenAmount> {
        self.ask(chain, &RewardsQuery::RewardPerEpoch)
    }

    /// Parameters, totals and pool balance
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn data(&self, chain: &LocalChain) -> ChainResult<RewardData> {
        self.ask(chain, &RewardsQuery::GetData)
    }

    /// Reward `account` could claim now
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn available_reward(&self, chain: &LocalChain, account: Address) -> ChainResult<TokenAmount> {
        self.ask(chain, &RewardsQuery::AvailableReward(account))
    }

    /// Reward positions of `accounts`
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn user_info(&self, chain: &LocalChain, accounts: Vec<Address>) -> ChainResult<Vec<UserInfo>> {
        self.ask(chain, &RewardsQuery::UserInfo(accounts))
    }

    /// Contract owner
    ///
    /// # Errors
    /// Returns error if the query fails
    pub fn owner(&self, chain: &LocalChain) -> ChainResult<Address> {
        self.ask(chain, &RewardsQuery::Owner)
    }
}
