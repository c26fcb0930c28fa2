//! Transaction processor - executes contracts and applies state transitions.
//!
//! This is the enforcement layer that makes contract calls binding. It
//! validates signed transactions, runs contract logic against the world state
//! and either commits every write or rolls all of them back.

use tracing::{debug, error, info};

use super::{Contract, ContractError, ContractRegistry, ContractResult, ExecutionResult};
use crate::contracts::encode;
use crate::contracts::loader::{ContractLoader, NativeLoader};
use crate::contracts::state::{BlockContext, ContractState};
use crate::contracts::transaction::{ContractTransaction, DeployTransaction, TransactionKind};
use crate::state::WorldState;
use crate::types::{Address, Id};

/// Processes contract transactions and applies state transitions
pub struct TransactionProcessor {
    /// Contract registry for looking up contracts
    registry: ContractRegistry,
    /// Contract loader for deploying new contracts
    loader: Box<dyn ContractLoader>,
}

impl TransactionProcessor {
    /// Create new transaction processor with empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::with_loader(Box::new(NativeLoader::new()))
    }

    /// Create a processor with a custom loader
    #[must_use]
    pub fn with_loader(loader: Box<dyn ContractLoader>) -> Self {
        Self {
            registry: ContractRegistry::new(),
            loader,
        }
    }

    /// Get reference to contract registry
    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// Re-register every contract whose code is recorded in `world`
    ///
    /// # Errors
    /// Returns error if stored code can no longer be loaded
    pub fn rebuild_registry(&mut self, world: &WorldState) -> ContractResult<()> {
        let mut registry = ContractRegistry::new();
        for (id, code) in &world.contracts {
            registry.register(self.loader.load(*id, code)?);
        }
        debug!(contracts = registry.contract_count(), "Rebuilt contract registry");
        self.registry = registry;
        Ok(())
    }

    /// Process a transaction of any kind
    ///
    /// Once a transaction passes validation the sender's nonce is consumed,
    /// whether or not the contract call succeeds.
    ///
    /// # Errors
    /// Returns error if validation fails or the contract reverts
    pub fn process_transaction(
        &mut self,
        kind: &TransactionKind,
        world: &mut WorldState,
        block: BlockContext,
    ) -> ContractResult<ExecutionResult> {
        Self::validate_nonce(kind, world)?;

        let result = match kind {
            TransactionKind::Deploy(tx) => self.deploy(tx, world, block),
            TransactionKind::Execute(tx) => {
                let contract = self
                    .registry
                    .get(&tx.contract_id)
                    .ok_or(ContractError::NotFound(tx.contract_id))?;
                Self::execute_transaction(contract, tx, world, block)
            }
        };

        // a revert still uses the nonce
        if !matches!(
            result,
            Err(ContractError::InvalidTransaction(_) | ContractError::NotFound(_))
        ) {
            world.bump_nonce(kind.sender());
        }
        result
    }

    fn deploy(
        &mut self,
        tx: &DeployTransaction,
        world: &mut WorldState,
        block: BlockContext,
    ) -> ContractResult<ExecutionResult> {
        tx.verify_signature()
            .map_err(|e| ContractError::InvalidTransaction(format!("Invalid signature: {e}")))?;

        let contract_id = tx.contract_id();
        if self.registry.contains(&contract_id) {
            return Err(ContractError::InvalidTransaction(format!(
                "Contract {contract_id} already deployed"
            )));
        }

        let contract = self.loader.load(contract_id, &tx.code)?;

        let result = {
            let mut state = ContractState::new(&world.accounts, &mut world.storage, block);
            if let Err(e) = contract.on_deploy(&mut state, tx.deployer_address, &tx.init_data) {
                error!(
                    contract = contract.name(),
                    error = %e,
                    "Contract deployment failed in on_deploy"
                );
                state.rollback();
                return Err(e);
            }
            state.commit();
            ExecutionResult::from_state(&state, encode(&contract_id)?)
        };

        world.contracts.insert(contract_id, tx.code.clone());
        info!(
            contract = contract.name(),
            contract_id = %contract_id,
            address = %Address::from_contract_id(&contract_id),
            "Deployed contract"
        );
        self.registry.register(contract);

        Ok(result)
    }

    /// Execute a contract transaction
    ///
    /// 1. Verifies the signature
    /// 2. Creates contract state wrapper
    /// 3. Executes contract logic
    /// 4. On success: checks the reported state root and commits
    /// 5. On failure: rolls back all changes
    ///
    /// # Errors
    /// Returns error if transaction is invalid or execution fails
    pub fn execute_transaction(
        contract: &dyn Contract,
        tx: &ContractTransaction,
        world: &mut WorldState,
        block: BlockContext,
    ) -> ContractResult<ExecutionResult> {
        Self::validate_signature(tx)?;

        let mut state = ContractState::new(&world.accounts, &mut world.storage, block);

        debug!(
            contract_id = %contract.id(),
            tx_id = %tx.id,
            sender = %tx.sender_address,
            "Executing contract transaction"
        );

        match contract.execute(&mut state, tx) {
            Ok(exec_result) => {
                let computed_root = state.compute_state_root();
                if computed_root != exec_result.new_state_root {
                    error!(
                        expected = %exec_result.new_state_root,
                        got = %computed_root,
                        "State root mismatch"
                    );
                    state.rollback();
                    return Err(ContractError::StateRootMismatch {
                        expected: exec_result.new_state_root,
                        got: computed_root,
                    });
                }

                state.commit();

                info!(
                    contract = contract.name(),
                    tx_id = %tx.id,
                    events = exec_result.events.len(),
                    "Contract execution successful"
                );

                Ok(exec_result)
            }
            Err(e) => {
                debug!(
                    contract = contract.name(),
                    tx_id = %tx.id,
                    error = %e,
                    "Contract execution failed"
                );
                state.rollback();
                Err(e)
            }
        }
    }

    /// Answer a read-only query against a deployed contract
    ///
    /// # Errors
    /// Returns error if the contract is unknown or the query fails
    pub fn query(
        &self,
        contract_id: &Id,
        input: &[u8],
        world: &WorldState,
        block: BlockContext,
    ) -> ContractResult<Vec<u8>> {
        let contract = self
            .registry
            .get(contract_id)
            .ok_or(ContractError::NotFound(*contract_id))?;
        let state = ContractState::view(&world.accounts, &world.storage, block);
        contract.query(&state, input)
    }

    fn validate_signature(tx: &ContractTransaction) -> ContractResult<()> {
        if tx.id != tx.compute_id() {
            return Err(ContractError::InvalidTransaction(
                "Transaction id does not match contents".to_string(),
            ));
        }
        if tx.sender_address != Address::from_public_key(&tx.sender) {
            return Err(ContractError::InvalidTransaction(
                "Sender address does not match public key".to_string(),
            ));
        }
        tx.verify_signature()
            .map_err(|e| ContractError::InvalidTransaction(format!("Invalid signature: {e}")))
    }

    fn validate_nonce(kind: &TransactionKind, world: &WorldState) -> ContractResult<()> {
        let expected_nonce = world.next_nonce(&kind.sender());
        if kind.nonce() != expected_nonce {
            return Err(ContractError::InvalidTransaction(format!(
                "Invalid nonce: expected {}, got {}",
                expected_nonce,
                kind.nonce()
            )));
        }
        Ok(())
    }
}

impl Default for TransactionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::decode;
    use crate::contracts::token::{TokenCall, TokenInit, TokenQuery, TOKEN_CODE};
    use crate::crypto::Keypair;
    use crate::types::TokenAmount;

    const BLOCK: BlockContext = BlockContext {
        height: 1,
        timestamp: 1_000,
    };

    fn deploy_token(
        processor: &mut TransactionProcessor,
        world: &mut WorldState,
        owner: &Keypair,
    ) -> Id {
        let init = encode(&TokenInit {
            name: "Reward".to_string(),
            symbol: "RWD".to_string(),
            initial_supply: TokenAmount::from_tokens(100),
        })
        .unwrap();
        let nonce = world.next_nonce(&Address::from_public_key(owner.public_key()));
        let tx = DeployTransaction::signed(TOKEN_CODE.to_vec(), init, owner, nonce);
        let result = processor
            .process_transaction(&TransactionKind::Deploy(tx), world, BLOCK)
            .unwrap();
        decode(&result.output).unwrap()
    }

    fn balance(processor: &TransactionProcessor, world: &WorldState, token: &Id, who: Address) -> TokenAmount {
        let out = processor
            .query(token, &encode(&TokenQuery::BalanceOf(who)).unwrap(), world, BLOCK)
            .unwrap();
        decode(&out).unwrap()
    }

    #[test]
    fn test_deploy_and_transfer() {
        let mut processor = TransactionProcessor::default();
        let mut world = WorldState::new();
        let owner = Keypair::generate();
        let owner_addr = Address::from_public_key(owner.public_key());
        let bob = Address::from_bytes([2; 20]);

        let token = deploy_token(&mut processor, &mut world, &owner);
        assert!(processor.registry().contains(&token));

        let input = encode(&TokenCall::Transfer {
            to: bob,
            amount: TokenAmount::from_tokens(30),
        })
        .unwrap();
        let tx = ContractTransaction::signed(token, &owner, input, 2);
        processor
            .process_transaction(&TransactionKind::Execute(tx), &mut world, BLOCK)
            .unwrap();

        assert_eq!(balance(&processor, &world, &token, owner_addr), TokenAmount::from_tokens(70));
        assert_eq!(balance(&processor, &world, &token, bob), TokenAmount::from_tokens(30));
        assert_eq!(world.next_nonce(&owner_addr), 3);
    }

    #[test]
    fn test_revert_rolls_back_and_consumes_nonce() {
        let mut processor = TransactionProcessor::default();
        let mut world = WorldState::new();
        let owner = Keypair::generate();
        let owner_addr = Address::from_public_key(owner.public_key());
        let token = deploy_token(&mut processor, &mut world, &owner);
        let storage_before = world.storage.clone();

        let input = encode(&TokenCall::Transfer {
            to: Address::from_bytes([2; 20]),
            amount: TokenAmount::from_tokens(1_000),
        })
        .unwrap();
        let tx = ContractTransaction::signed(token, &owner, input, 2);
        let err = processor
            .process_transaction(&TransactionKind::Execute(tx), &mut world, BLOCK)
            .unwrap_err();

        assert_eq!(err.revert_reason(), Some("Insufficient token balance"));
        assert_eq!(world.storage, storage_before);
        assert_eq!(world.next_nonce(&owner_addr), 3);
    }

    #[test]
    fn test_bad_nonce_rejected() {
        let mut processor = TransactionProcessor::default();
        let mut world = WorldState::new();
        let owner = Keypair::generate();
        let token = deploy_token(&mut processor, &mut world, &owner);

        let tx = ContractTransaction::signed(token, &owner, Vec::new(), 7);
        let err = processor
            .process_transaction(&TransactionKind::Execute(tx), &mut world, BLOCK)
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidTransaction(_)));
    }

    #[test]
    fn test_forged_signature_rejected() {
        let mut processor = TransactionProcessor::default();
        let mut world = WorldState::new();
        let owner = Keypair::generate();
        let mallory = Keypair::generate();
        let token = deploy_token(&mut processor, &mut world, &owner);

        let mut tx = ContractTransaction::signed(token, &owner, Vec::new(), 2);
        tx.signature = mallory.sign(&tx.signing_bytes());
        let err = processor
            .process_transaction(&TransactionKind::Execute(tx), &mut world, BLOCK)
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidTransaction(_)));
    }

    #[test]
    fn test_unknown_contract() {
        let mut processor = TransactionProcessor::default();
        let mut world = WorldState::new();
        let kp = Keypair::generate();
        let tx = ContractTransaction::signed(crate::crypto::Hash::ZERO, &kp, Vec::new(), 1);
        let err = processor
            .process_transaction(&TransactionKind::Execute(tx), &mut world, BLOCK)
            .unwrap_err();
        assert!(matches!(err, ContractError::NotFound(_)));
        assert_eq!(world.next_nonce(&Address::from_public_key(kp.public_key())), 1);
    }

    #[test]
    fn test_rebuild_registry() {
        let mut processor = TransactionProcessor::default();
        let mut world = WorldState::new();
        let owner = Keypair::generate();
        let token = deploy_token(&mut processor, &mut world, &owner);

        let mut fresh = TransactionProcessor::default();
        fresh.rebuild_registry(&world).unwrap();
        assert!(fresh.registry().contains(&token));
        assert_eq!(
            balance(&fresh, &world, &token, Address::from_public_key(owner.public_key())),
            TokenAmount::from_tokens(100)
        );
    }
}
