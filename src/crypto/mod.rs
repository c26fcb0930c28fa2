//! Cryptographic primitives for the rewards chain.
//!
//! - Ed25519 for transaction signatures
//! - BLAKE3 for hashing, contract ids and state roots

mod hash;
mod signature;

pub use hash::{hash_data, merkle_root, Hash};
pub use signature::{
    sign, verify, Keypair, PublicKey, SecretKey, Signature, PUBKEY_SIZE, SECRET_KEY_SIZE,
    SIGNATURE_SIZE,
};

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid signature
    #[error("invalid signature")]
    InvalidSignature,
    /// Invalid public key format
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    /// Invalid secret key format
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    /// Invalid hash format
    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
