//! Transaction signatures using Ed25519.
//!
//! Thin wrappers over `ed25519-dalek` so the rest of the crate only sees
//! byte-oriented, serde-friendly key and signature types.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{CryptoError, CryptoResult};

/// Ed25519 public key size in bytes
pub const PUBKEY_SIZE: usize = 32;
/// Ed25519 signature size in bytes
pub const SIGNATURE_SIZE: usize = 64;
/// Ed25519 secret key (seed) size in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// An Ed25519 signature
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(&s).map_err(serde::de::Error::custom)?
        } else {
            <Vec<u8>>::deserialize(deserializer)?
        };
        if bytes.len() != SIGNATURE_SIZE {
            return Err(serde::de::Error::custom(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }
}

impl Signature {
    /// Create from raw bytes
    ///
    /// # Errors
    /// Returns error if bytes are not the correct length
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignature);
        }
        Ok(Self(bytes.to_vec()))
    }

    /// All-zero sentinel for "not yet signed". Never verifies.
    #[must_use]
    pub fn placeholder() -> Self {
        Self(vec![0u8; SIGNATURE_SIZE])
    }

    /// Get underlying bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({}..)", &self.to_hex()[..16])
    }
}

/// An Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; PUBKEY_SIZE]);

impl PublicKey {
    /// Create from raw bytes (validated as a curve point)
    ///
    /// # Errors
    /// Returns error if bytes don't represent a valid Ed25519 public key
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; PUBKEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBKEY_SIZE,
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&arr)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self(arr))
    }

    /// Get underlying bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBKEY_SIZE] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns error if hex is invalid or key is malformed
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey({}..)", &self.to_hex()[..16])
    }
}

/// An Ed25519 secret key (32-byte seed)
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    /// Create from a 32-byte seed
    ///
    /// # Errors
    /// Returns error if the seed is not 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let seed: [u8; SECRET_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSecretKey(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(SigningKey::from_bytes(&seed)))
    }

    /// Export the seed bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.0.to_bytes()
    }
}

/// A signing keypair
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh random keypair
    #[must_use]
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_secret(SecretKey(signing))
    }

    /// Derive the keypair for a secret key
    #[must_use]
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = PublicKey(secret.0.verifying_key().to_bytes());
        Self { secret, public }
    }

    /// Public half
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Secret half
    #[must_use]
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Sign a message
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        sign(&self.secret, message)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Sign a message with a secret key
#[must_use]
pub fn sign(secret: &SecretKey, message: &[u8]) -> Signature {
    Signature(secret.0.sign(message).to_bytes().to_vec())
}

/// Verify a signature over a message
///
/// # Errors
/// Returns `InvalidSignature` if the signature does not match
pub fn verify(public: &PublicKey, message: &[u8], signature: &Signature) -> CryptoResult<()> {
    let key = VerifyingKey::from_bytes(&public.0)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let sig = ed25519_dalek::Signature::from_slice(&signature.0)
        .map_err(|_| CryptoError::InvalidSignature)?;
    key.verify(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"claim");
        assert!(verify(kp.public_key(), b"claim", &sig).is_ok());
        assert!(verify(kp.public_key(), b"supply", &sig).is_err());
    }

    #[test]
    fn test_placeholder_never_verifies() {
        let kp = Keypair::generate();
        assert!(verify(kp.public_key(), b"msg", &Signature::placeholder()).is_err());
    }

    #[test]
    fn test_secret_roundtrip() {
        let kp = Keypair::generate();
        let secret = SecretKey::from_bytes(&kp.secret_key().to_bytes()).unwrap();
        let restored = Keypair::from_secret(secret);
        assert_eq!(restored.public_key(), kp.public_key());
    }

    #[test]
    fn test_signature_serde() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"msg");
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
