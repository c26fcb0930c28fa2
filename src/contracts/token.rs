//! Token Contract - the fungible reward token.
//!
//! The deployer becomes the owner and receives the initial supply. Balances
//! live in the token contract's storage; the free functions in this module
//! are the token ledger other contracts use to move tokens they hold.

use serde::{Deserialize, Serialize};

use crate::contracts::state::ContractState;
use crate::contracts::transaction::ContractTransaction;
use crate::contracts::{
    decode, encode, Contract, ContractError, ContractEvent, ContractResult, ExecutionResult,
};
use crate::crypto::Hash;
use crate::types::{Address, TokenAmount, TOKEN_DECIMALS};

/// Code marker the native loader maps to `TokenContract`
pub const TOKEN_CODE: &[u8] = b"native:token";

const KEY_METADATA: &[u8] = b"token:meta";
const BALANCE_PREFIX: &[u8] = b"token:bal:";

/// Constructor arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInit {
    /// Token name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Supply minted to the deployer
    pub initial_supply: TokenAmount,
}

/// State-changing calls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TokenCall {
    /// Move tokens from the caller
    Transfer {
        /// Recipient
        to: Address,
        /// Amount
        amount: TokenAmount,
    },
    /// Create new tokens (owner only)
    Mint {
        /// Recipient
        to: Address,
        /// Amount
        amount: TokenAmount,
    },
}

/// Read-only queries
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TokenQuery {
    /// Balance of an address -> `TokenAmount`
    BalanceOf(Address),
    /// Owner -> `Address`
    Owner,
    /// Total supply -> `TokenAmount`
    TotalSupply,
    /// Full metadata -> `TokenMetadata`
    Metadata,
}

/// Token metadata stored at deployment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Contract id
    pub id: Hash,
    /// Token name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u32,
    /// Owner (deployer)
    pub owner: Address,
    /// Tokens in existence
    pub total_supply: TokenAmount,
}

/// Payload of the `Transfer` event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Sender (`Address::ZERO` for mints)
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Amount moved
    pub amount: TokenAmount,
}

fn balance_key(holder: &Address) -> Vec<u8> {
    let mut key = BALANCE_PREFIX.to_vec();
    key.extend_from_slice(holder.as_bytes());
    key
}

/// Whether `token` is a deployed token contract
#[must_use]
pub fn is_token(state: &ContractState<'_>, token: &Address) -> bool {
    state.storage_contains(token, KEY_METADATA)
}

fn load_metadata(state: &ContractState<'_>, token: &Address) -> ContractResult<TokenMetadata> {
    let data = state
        .storage_read(token, KEY_METADATA)
        .ok_or_else(|| ContractError::Reverted(format!("{token} is not a token")))?;
    decode(&data)
}

fn save_metadata(
    state: &mut ContractState<'_>,
    token: Address,
    metadata: &TokenMetadata,
) -> ContractResult<()> {
    state.storage_write(token, KEY_METADATA.to_vec(), encode(metadata)?)
}

/// Token balance of `holder`
///
/// # Errors
/// Returns error if the stored balance is corrupt
pub fn balance_of(
    state: &ContractState<'_>,
    token: &Address,
    holder: &Address,
) -> ContractResult<TokenAmount> {
    state
        .storage_read(token, &balance_key(holder))
        .map_or(Ok(TokenAmount::ZERO), |data| decode(&data))
}

fn set_balance(
    state: &mut ContractState<'_>,
    token: Address,
    holder: Address,
    amount: TokenAmount,
) -> ContractResult<()> {
    if amount.is_zero() {
        state.storage_delete(token, balance_key(&holder))
    } else {
        state.storage_write(token, balance_key(&holder), encode(&amount)?)
    }
}

/// Move `amount` of `token` from `from` to `to`
///
/// # Errors
/// Reverts with "Insufficient token balance" if `from` is short, or if
/// `token` is not a deployed token
pub fn transfer(
    state: &mut ContractState<'_>,
    token: Address,
    from: Address,
    to: Address,
    amount: TokenAmount,
) -> ContractResult<()> {
    let metadata = load_metadata(state, &token)?;

    let remaining = balance_of(state, &token, &from)?
        .checked_sub(amount)
        .ok_or_else(|| ContractError::Reverted("Insufficient token balance".to_string()))?;

    if from != to {
        let credited = balance_of(state, &token, &to)?
            .checked_add(amount)
            .ok_or_else(|| ContractError::Reverted("Token balance overflow".to_string()))?;
        set_balance(state, token, from, remaining)?;
        set_balance(state, token, to, credited)?;
    }

    emit_transfer(state, metadata.id, TransferEvent { from, to, amount })
}

fn emit_transfer(
    state: &mut ContractState<'_>,
    contract_id: Hash,
    event: TransferEvent,
) -> ContractResult<()> {
    state.emit_event(ContractEvent {
        contract_id,
        topic: "Transfer".to_string(),
        data: encode(&event)?,
    });
    Ok(())
}

/// Token contract, fully storage-backed
#[derive(Clone, Debug)]
pub struct TokenContract {
    id: Hash,
}

impl TokenContract {
    /// Create the contract handle for a deployed id
    #[must_use]
    pub fn new(id: Hash) -> Self {
        Self { id }
    }

    fn execute_mint(
        &self,
        state: &mut ContractState<'_>,
        caller: Address,
        to: Address,
        amount: TokenAmount,
    ) -> ContractResult<()> {
        let token = self.address();
        let mut metadata = load_metadata(state, &token)?;
        if caller != metadata.owner {
            return Err(ContractError::Reverted("Caller is not the owner".to_string()));
        }

        metadata.total_supply = metadata
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| ContractError::Reverted("Total supply overflow".to_string()))?;
        let balance = balance_of(state, &token, &to)?
            .checked_add(amount)
            .ok_or_else(|| ContractError::Reverted("Token balance overflow".to_string()))?;

        save_metadata(state, token, &metadata)?;
        set_balance(state, token, to, balance)?;
        emit_transfer(
            state,
            self.id,
            TransferEvent {
                from: Address::ZERO,
                to,
                amount,
            },
        )
    }
}

impl Contract for TokenContract {
    fn id(&self) -> Hash {
        self.id
    }

    fn name(&self) -> &str {
        "Token"
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
        let init: TokenInit = decode(init_data)?;
        if init.symbol.is_empty() {
            return Err(ContractError::Reverted("Symbol must not be empty".to_string()));
        }

        let token = self.address();
        let metadata = TokenMetadata {
            id: self.id,
            name: init.name,
            symbol: init.symbol,
            decimals: TOKEN_DECIMALS,
            owner: deployer,
            total_supply: init.initial_supply,
        };
        save_metadata(state, token, &metadata)?;
        set_balance(state, token, deployer, init.initial_supply)?;
        emit_transfer(
            state,
            self.id,
            TransferEvent {
                from: Address::ZERO,
                to: deployer,
                amount: init.initial_supply,
            },
        )
    }

    fn execute(
        &self,
        state: &mut ContractState<'_>,
        tx: &ContractTransaction,
    ) -> ContractResult<ExecutionResult> {
        let call: TokenCall = decode(&tx.input)
            .map_err(|e| ContractError::InvalidTransaction(format!("Failed to parse call: {e}")))?;

        match call {
            TokenCall::Transfer { to, amount } => {
                transfer(state, self.address(), tx.sender_address, to, amount)?;
            }
            TokenCall::Mint { to, amount } => {
                self.execute_mint(state, tx.sender_address, to, amount)?;
            }
        }

        Ok(ExecutionResult::from_state(state, Vec::new()))
    }

    fn query(&self, state: &ContractState<'_>, input: &[u8]) -> ContractResult<Vec<u8>> {
        let query: TokenQuery = decode(input)?;
        let token = self.address();
        match query {
            TokenQuery::BalanceOf(holder) => encode(&balance_of(state, &token, &holder)?),
            TokenQuery::Owner => encode(&load_metadata(state, &token)?.owner),
            TokenQuery::TotalSupply => encode(&load_metadata(state, &token)?.total_supply),
            TokenQuery::Metadata => encode(&load_metadata(state, &token)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::state::BlockContext;
    use crate::crypto::{hash_data, Keypair};
    use crate::state::Storage;
    use std::collections::HashMap;

    const BLOCK: BlockContext = BlockContext {
        height: 1,
        timestamp: 1_000,
    };

    fn deployed(
        storage: &mut Storage,
        deployer: Address,
        supply: u64,
    ) -> TokenContract {
        let accounts = HashMap::new();
        let contract = TokenContract::new(hash_data(b"token"));
        let mut state = ContractState::new(&accounts, storage, BLOCK);
        let init = encode(&TokenInit {
            name: "Reward".to_string(),
            symbol: "RWD".to_string(),
            initial_supply: TokenAmount::from_tokens(supply),
        })
        .unwrap();
        contract.on_deploy(&mut state, deployer, &init).unwrap();
        state.commit();
        contract
    }

    #[test]
    fn test_deploy_mints_to_owner() {
        let mut storage = Storage::new();
        let owner = Address::from_bytes([1; 20]);
        let token = deployed(&mut storage, owner, 1_000);

        let accounts = HashMap::new();
        let state = ContractState::view(&accounts, &storage, BLOCK);
        assert!(is_token(&state, &token.address()));
        assert_eq!(
            balance_of(&state, &token.address(), &owner).unwrap(),
            TokenAmount::from_tokens(1_000)
        );

        let owner_bytes = token.query(&state, &encode(&TokenQuery::Owner).unwrap()).unwrap();
        assert_eq!(decode::<Address>(&owner_bytes).unwrap(), owner);
    }

    #[test]
    fn test_ledger_transfer() {
        let mut storage = Storage::new();
        let owner = Address::from_bytes([1; 20]);
        let pool = Address::from_bytes([2; 20]);
        let token = deployed(&mut storage, owner, 100);

        let accounts = HashMap::new();
        let mut state = ContractState::new(&accounts, &mut storage, BLOCK);
        transfer(&mut state, token.address(), owner, pool, TokenAmount::from_tokens(40)).unwrap();

        assert_eq!(
            balance_of(&state, &token.address(), &owner).unwrap(),
            TokenAmount::from_tokens(60)
        );
        assert_eq!(
            balance_of(&state, &token.address(), &pool).unwrap(),
            TokenAmount::from_tokens(40)
        );

        let err = transfer(&mut state, token.address(), pool, owner, TokenAmount::from_tokens(41))
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("Insufficient token balance"));
    }

    fn mint_as(
        storage: &mut Storage,
        token: &TokenContract,
        signer: &Keypair,
        to: Address,
        amount: TokenAmount,
    ) -> ContractResult<ExecutionResult> {
        let accounts = HashMap::new();
        let input = encode(&TokenCall::Mint { to, amount }).unwrap();
        let tx = ContractTransaction::signed(token.id(), signer, input, 1);
        let mut state = ContractState::new(&accounts, storage, BLOCK);
        let result = token.execute(&mut state, &tx);
        match result {
            Ok(_) => state.commit(),
            Err(_) => state.rollback(),
        }
        result
    }

    fn total_supply(storage: &Storage, token: &TokenContract) -> TokenAmount {
        let accounts = HashMap::new();
        let state = ContractState::view(&accounts, storage, BLOCK);
        let bytes = token.query(&state, &encode(&TokenQuery::TotalSupply).unwrap()).unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn test_owner_mints() {
        let mut storage = Storage::new();
        let owner_kp = Keypair::generate();
        let owner = Address::from_public_key(owner_kp.public_key());
        let holder = Address::from_bytes([7; 20]);
        let token = deployed(&mut storage, owner, 1_000);

        let result = mint_as(&mut storage, &token, &owner_kp, holder, TokenAmount::from_tokens(250)).unwrap();
        let event: TransferEvent = result.event("Transfer").unwrap().decode().unwrap();
        assert_eq!(event.from, Address::ZERO);
        assert_eq!(event.to, holder);

        assert_eq!(total_supply(&storage, &token), TokenAmount::from_tokens(1_250));
        let accounts = HashMap::new();
        let state = ContractState::view(&accounts, &storage, BLOCK);
        assert_eq!(
            balance_of(&state, &token.address(), &holder).unwrap(),
            TokenAmount::from_tokens(250)
        );
    }

    #[test]
    fn test_only_owner_mints() {
        let mut storage = Storage::new();
        let owner = Address::from_bytes([1; 20]);
        let token = deployed(&mut storage, owner, 1_000);

        let mallory = Keypair::generate();
        let mallory_addr = Address::from_public_key(mallory.public_key());
        let err = mint_as(&mut storage, &token, &mallory, mallory_addr, TokenAmount::from_tokens(1))
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("Caller is not the owner"));

        assert_eq!(total_supply(&storage, &token), TokenAmount::from_tokens(1_000));
        let accounts = HashMap::new();
        let state = ContractState::view(&accounts, &storage, BLOCK);
        assert_eq!(
            balance_of(&state, &token.address(), &mallory_addr).unwrap(),
            TokenAmount::ZERO
        );
    }

    #[test]
    fn test_transfer_to_unknown_token_reverts() {
        let mut storage = Storage::new();
        let accounts = HashMap::new();
        let mut state = ContractState::new(&accounts, &mut storage, BLOCK);
        let kp = Keypair::generate();
        let holder = Address::from_public_key(kp.public_key());

        let result = transfer(
            &mut state,
            Address::from_bytes([5; 20]),
            holder,
            holder,
            TokenAmount::ZERO,
        );
        assert!(matches!(result, Err(ContractError::Reverted(_))));
    }
}
