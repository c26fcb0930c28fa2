//! Contract transaction types.
//!
//! Transactions are signed proposals to deploy or call a contract. The
//! sender's nonce orders transactions and prevents replays.

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_data, Hash, Keypair, PublicKey, Signature};
use crate::types::{Address, Id};

/// A transaction that executes a smart contract
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractTransaction {
    /// Transaction ID (hash of contents)
    pub id: Id,
    /// Contract to execute
    pub contract_id: Id,
    /// Sender's public key
    pub sender: PublicKey,
    /// Sender's address
    pub sender_address: Address,
    /// Input data for contract execution
    pub input: Vec<u8>,
    /// Nonce (for ordering transactions from same sender)
    pub nonce: u64,
    /// Sender's signature
    pub signature: Signature,
}

impl ContractTransaction {
    /// Create new contract transaction (unsigned)
    #[must_use]
    pub fn new(contract_id: Id, sender: PublicKey, input: Vec<u8>, nonce: u64) -> Self {
        let sender_address = Address::from_public_key(&sender);

        let mut tx = Self {
            id: Hash::ZERO,
            contract_id,
            sender,
            sender_address,
            input,
            nonce,
            signature: Signature::placeholder(),
        };

        tx.id = tx.compute_id();
        tx
    }

    /// Create and sign in one step
    #[must_use]
    pub fn signed(contract_id: Id, keypair: &Keypair, input: Vec<u8>, nonce: u64) -> Self {
        let mut tx = Self::new(contract_id, *keypair.public_key(), input, nonce);
        tx.signature = keypair.sign(&tx.signing_bytes());
        tx
    }

    /// Compute transaction ID
    #[must_use]
    pub fn compute_id(&self) -> Id {
        let mut data = Vec::new();
        data.extend_from_slice(b"call");
        data.extend_from_slice(self.contract_id.as_bytes());
        data.extend_from_slice(self.sender.as_bytes());
        data.extend_from_slice(&self.input);
        data.extend_from_slice(&self.nonce.to_le_bytes());

        hash_data(&data)
    }

    /// Get bytes to sign
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(self.id.as_bytes());
        data.extend_from_slice(self.contract_id.as_bytes());
        data.extend_from_slice(self.sender.as_bytes());
        data.extend_from_slice(&self.input);
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data
    }

    /// Verify transaction signature
    ///
    /// # Errors
    /// Returns error if signature is invalid
    pub fn verify_signature(&self) -> Result<(), crate::crypto::CryptoError> {
        crate::crypto::verify(&self.sender, &self.signing_bytes(), &self.signature)
    }
}

/// A transaction that deploys a contract
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployTransaction {
    /// Transaction ID (hash of contents)
    pub id: Id,
    /// Contract code (a `native:` marker)
    pub code: Vec<u8>,
    /// Constructor arguments
    pub init_data: Vec<u8>,
    /// Deployer's public key
    pub deployer: PublicKey,
    /// Deployer's address
    pub deployer_address: Address,
    /// Deployer nonce
    pub nonce: u64,
    /// Deployer's signature
    pub signature: Signature,
}

impl DeployTransaction {
    /// Create and sign a deployment
    #[must_use]
    pub fn signed(code: Vec<u8>, init_data: Vec<u8>, keypair: &Keypair, nonce: u64) -> Self {
        let deployer = *keypair.public_key();
        let mut tx = Self {
            id: Hash::ZERO,
            code,
            init_data,
            deployer,
            deployer_address: Address::from_public_key(&deployer),
            nonce,
            signature: Signature::placeholder(),
        };
        tx.id = tx.compute_id();
        tx.signature = keypair.sign(tx.id.as_bytes());
        tx
    }

    /// Compute transaction ID
    #[must_use]
    pub fn compute_id(&self) -> Id {
        let mut data = Vec::new();
        data.extend_from_slice(b"deploy");
        data.extend_from_slice(&(self.code.len() as u64).to_le_bytes());
        data.extend_from_slice(&self.code);
        data.extend_from_slice(&self.init_data);
        data.extend_from_slice(self.deployer.as_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        hash_data(&data)
    }

    /// Id the deployed contract will get: `BLAKE3(code ‖ deployer ‖ nonce)`
    #[must_use]
    pub fn contract_id(&self) -> Id {
        let mut data = Vec::new();
        data.extend_from_slice(&self.code);
        data.extend_from_slice(self.deployer_address.as_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        hash_data(&data)
    }

    /// Verify the deployer's signature
    ///
    /// # Errors
    /// Returns error if the id was tampered with or the signature is invalid
    pub fn verify_signature(&self) -> Result<(), crate::crypto::CryptoError> {
        if self.compute_id() != self.id {
            return Err(crate::crypto::CryptoError::InvalidSignature);
        }
        crate::crypto::verify(&self.deployer, self.id.as_bytes(), &self.signature)
    }
}

/// Types of contract transactions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Execute a contract
    Execute(ContractTransaction),
    /// Deploy a new contract
    Deploy(DeployTransaction),
}

impl TransactionKind {
    /// Transaction id
    #[must_use]
    pub fn id(&self) -> Id {
        match self {
            Self::Execute(tx) => tx.id,
            Self::Deploy(tx) => tx.id,
        }
    }

    /// Address of the signer
    #[must_use]
    pub fn sender(&self) -> Address {
        match self {
            Self::Execute(tx) => tx.sender_address,
            Self::Deploy(tx) => tx.deployer_address,
        }
    }

    /// Signer's nonce
    #[must_use]
    pub fn nonce(&self) -> u64 {
        match self {
            Self::Execute(tx) => tx.nonce,
            Self::Deploy(tx) => tx.nonce,
        }
    }
}
