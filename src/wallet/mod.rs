//! Wallet management.
//!
//! A wallet is a named Ed25519 keypair stored as JSON in a wallet directory,
//! `<data-dir>/wallets/<name>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::{Keypair, PublicKey, SecretKey, Signature};
use crate::types::Address;

/// Current wallet file format version
const WALLET_VERSION: u8 = 1;

/// Wallet file format
#[derive(Serialize, Deserialize)]
struct WalletFile {
    /// Version for compatibility
    version: u8,
    /// Algorithm identifier
    algorithm: String,
    /// Public key (hex)
    public_key: String,
    /// Secret key (hex), stored unencrypted
    secret_key: String,
    /// Wallet name
    name: String,
    /// Creation time (RFC 3339)
    created_at: String,
}

/// A named keypair
pub struct Wallet {
    keypair: Keypair,
    /// Wallet name
    pub name: String,
    /// Path to wallet file (if loaded from or saved to disk)
    pub path: Option<PathBuf>,
}

impl Wallet {
    /// Generate a new wallet
    #[must_use]
    pub fn generate(name: &str) -> Self {
        Self::from_keypair(name, Keypair::generate())
    }

    /// Wrap an existing keypair
    #[must_use]
    pub fn from_keypair(name: &str, keypair: Keypair) -> Self {
        Self {
            keypair,
            name: name.to_string(),
            path: None,
        }
    }

    /// Get the public key
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }

    /// Get the address
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_public_key(self.keypair.public_key())
    }

    /// Get the underlying keypair
    #[must_use]
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Sign a message
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }

    /// Save wallet to a file
    ///
    /// # Errors
    /// Returns error if file cannot be written
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<(), WalletError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WalletError::IoError(e.to_string()))?;
        }

        let wallet_file = WalletFile {
            version: WALLET_VERSION,
            algorithm: "ed25519".to_string(),
            public_key: self.keypair.public_key().to_hex(),
            secret_key: hex::encode(self.keypair.secret_key().to_bytes()),
            name: self.name.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let json = serde_json::to_string_pretty(&wallet_file)
            .map_err(|e| WalletError::SerializationError(e.to_string()))?;
        fs::write(path, json).map_err(|e| WalletError::IoError(e.to_string()))?;

        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Load wallet from a file
    ///
    /// # Errors
    /// Returns error if file cannot be read or is invalid
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WalletError::NotFound(path.display().to_string()));
        }

        let contents = fs::read_to_string(path).map_err(|e| WalletError::IoError(e.to_string()))?;
        let wallet_file: WalletFile = serde_json::from_str(&contents)
            .map_err(|e| WalletError::SerializationError(e.to_string()))?;

        if wallet_file.version != WALLET_VERSION {
            return Err(WalletError::UnsupportedVersion(wallet_file.version));
        }

        let secret_bytes = hex::decode(&wallet_file.secret_key)
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let secret = SecretKey::from_bytes(&secret_bytes)
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let keypair = Keypair::from_secret(secret);

        let public = PublicKey::from_hex(&wallet_file.public_key)
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        if &public != keypair.public_key() {
            return Err(WalletError::InvalidKey(
                "public key does not match secret key".to_string(),
            ));
        }

        Ok(Self {
            keypair,
            name: wallet_file.name,
            path: Some(path.to_path_buf()),
        })
    }

    /// File a wallet called `name` lives in under `dir`
    #[must_use]
    pub fn path_in(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.json"))
    }

    /// Load the wallet called `name` from `dir`
    ///
    /// # Errors
    /// Returns `NotFound` if there is no such wallet
    pub fn load_named(dir: &Path, name: &str) -> Result<Self, WalletError> {
        Self::load(Self::path_in(dir, name))
    }

    /// List all wallets in `dir`, sorted by name
    ///
    /// # Errors
    /// Returns error if directory cannot be read
    pub fn list_wallets(dir: &Path) -> Result<Vec<WalletInfo>, WalletError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut wallets = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| WalletError::IoError(e.to_string()))? {
            let path = entry.map_err(|e| WalletError::IoError(e.to_string()))?.path();

            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(wallet) = Self::load(&path) {
                    wallets.push(WalletInfo {
                        name: wallet.name.clone(),
                        address: wallet.address(),
                        path,
                    });
                }
            }
        }

        wallets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(wallets)
    }
}

/// Information about a wallet (without sensitive data)
#[derive(Clone, Debug)]
pub struct WalletInfo {
    /// Wallet name
    pub name: String,
    /// Wallet address
    pub address: Address,
    /// Path to wallet file
    pub path: PathBuf,
}

/// Wallet errors
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// Invalid key
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Unsupported wallet version
    #[error("unsupported wallet version: {0}")]
    UnsupportedVersion(u8),
    /// Wallet not found
    #[error("wallet not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    fn scratch_dir(tag: &str) -> PathBuf {
        temp_dir().join(format!("epoch_rewards_wallets_{tag}_{}", std::process::id()))
    }

    #[test]
    fn test_wallet_save_load() {
        let dir = scratch_dir("save");
        let mut wallet = Wallet::generate("alice");
        wallet.save(Wallet::path_in(&dir, "alice")).unwrap();

        let loaded = Wallet::load_named(&dir, "alice").unwrap();
        assert_eq!(loaded.address(), wallet.address());
        assert_eq!(loaded.name, "alice");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_wallet() {
        let dir = scratch_dir("missing");
        assert!(matches!(
            Wallet::load_named(&dir, "nobody"),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_wallets() {
        let dir = scratch_dir("list");
        for name in ["bob", "alice"] {
            Wallet::generate(name).save(Wallet::path_in(&dir, name)).unwrap();
        }

        let names: Vec<String> = Wallet::list_wallets(&dir)
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, ["alice", "bob"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_wallet_signing() {
        let wallet = Wallet::generate("signer");
        let message = b"claim";
        let signature = wallet.sign(message);

        assert!(crate::crypto::verify(wallet.public_key(), message, &signature).is_ok());
    }
}
