//! Defines the CryptoProvider trait family for crypto-agility.
//!
//! Concrete providers implement [`CryptoProvider`] plus the capability traits
//! matching what their algorithm can do, so the compiler rejects `sign` on an
//! RSA provider or `encrypt` on a Dilithium provider. Call sites that must not
//! care which algorithm they hold use the [`Provider`] tagged union, which
//! dispatches by `match` and turns a missing capability into
//! [`CryptoError::InvalidOperation`].

use crate::config::AgilityConfig;
use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::suites::classic::{EcdhProvider, RsaOaepProvider};
use crate::crypto::suites::hybrid::HybridProvider;
use crate::crypto::suites::post_quantum::{MlKemParameterSet, MlKemProvider};
use crate::crypto::suites::signature::DilithiumProvider;
use crate::crypto::{CryptoConfig, KeyPair};
use crate::error::{CryptoError, Result};
use zeroize::Zeroizing;

/// Surface shared by every concrete algorithm.
pub trait CryptoProvider: Send + Sync + 'static {
    fn algorithm(&self) -> AlgorithmId;

    /// Environment capability check. Never fails.
    fn is_supported(&self) -> bool;

    /// Generates a new key pair.
    fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Static descriptive metadata, no side effects.
    fn config(&self) -> CryptoConfig;
}

/// Public-key encryption of arbitrary (capacity-bounded) payloads.
pub trait EncryptionCapable: CryptoProvider {
    /// Encrypts `plaintext` for the holder of `recipient_public_key`.
    fn encrypt(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts a blob produced by [`EncryptionCapable::encrypt`].
    /// Every failure maps to the same `DecryptionFailed` error.
    fn decrypt(&self, ciphertext: &[u8], private_key: &[u8]) -> Result<Vec<u8>>;
}

/// Key encapsulation (ML-KEM family).
pub trait KemCapable: CryptoProvider {
    /// Returns `(ciphertext, shared_secret)`.
    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>)>;

    fn decapsulate(&self, private_key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// Detached signatures.
pub trait SignatureCapable: CryptoProvider {
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>>;

    /// Fails with `SignatureFailed` when the signature does not verify.
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()>;
}

/// One variant per concrete provider over the closed algorithm set.
#[derive(Debug)]
pub enum Provider {
    RsaOaep(RsaOaepProvider),
    Ecdh(EcdhProvider),
    MlKem(MlKemProvider),
    Dilithium(DilithiumProvider),
    Hybrid(HybridProvider),
}

impl Provider {
    /// Instantiates the provider for `algorithm`.
    ///
    /// Fails with `NotImplemented` for algorithms without a provider in this
    /// build and with `AlgorithmNotSupported` when the environment check fails.
    pub fn new(algorithm: AlgorithmId, config: &AgilityConfig) -> Result<Self> {
        let provider = match algorithm {
            AlgorithmId::RsaOaep => {
                Provider::RsaOaep(RsaOaepProvider::new(config.rsa_modulus_bits)?)
            }
            AlgorithmId::Ecdh => Provider::Ecdh(EcdhProvider::new()),
            AlgorithmId::MlKem512 => {
                Provider::MlKem(MlKemProvider::new(MlKemParameterSet::MlKem512))
            }
            AlgorithmId::MlKem768 => {
                Provider::MlKem(MlKemProvider::new(MlKemParameterSet::MlKem768))
            }
            AlgorithmId::MlKem1024 => {
                Provider::MlKem(MlKemProvider::new(MlKemParameterSet::MlKem1024))
            }
            AlgorithmId::Dilithium => Provider::Dilithium(DilithiumProvider::new()),
            AlgorithmId::SphincsPlus => {
                return Err(CryptoError::NotImplemented(
                    "SPHINCS+ provider is not available in this build".to_string(),
                ))
            }
            AlgorithmId::HybridRsaMlKem => Provider::Hybrid(HybridProvider::rsa_ml_kem(config)?),
            AlgorithmId::HybridEcdhMlKem => Provider::Hybrid(HybridProvider::ecdh_ml_kem()),
        };

        if !provider.is_supported() {
            return Err(CryptoError::AlgorithmNotSupported(format!(
                "{} failed the environment capability check",
                algorithm
            )));
        }
        Ok(provider)
    }

    /// RSA-OAEP with the stronger modulus from the config (4096 bits by default).
    pub fn stronger_rsa(config: &AgilityConfig) -> Result<Self> {
        Ok(Provider::RsaOaep(RsaOaepProvider::new(config.rsa_strong_modulus_bits)?))
    }

    fn base(&self) -> &dyn CryptoProvider {
        match self {
            Provider::RsaOaep(p) => p,
            Provider::Ecdh(p) => p,
            Provider::MlKem(p) => p,
            Provider::Dilithium(p) => p,
            Provider::Hybrid(p) => p,
        }
    }

    fn encryptor(&self) -> Option<&dyn EncryptionCapable> {
        match self {
            Provider::RsaOaep(p) => Some(p as &dyn EncryptionCapable),
            Provider::Ecdh(p) => Some(p as &dyn EncryptionCapable),
            Provider::MlKem(p) => Some(p as &dyn EncryptionCapable),
            Provider::Hybrid(p) => Some(p as &dyn EncryptionCapable),
            Provider::Dilithium(_) => None,
        }
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.base().algorithm()
    }

    pub fn is_supported(&self) -> bool {
        self.base().is_supported()
    }

    pub fn generate_key_pair(&self) -> Result<KeyPair> {
        self.base().generate_key_pair()
    }

    pub fn config(&self) -> CryptoConfig {
        self.base().config()
    }

    pub fn encrypt(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>> {
        match self.encryptor() {
            Some(p) => p.encrypt(plaintext, recipient_public_key),
            None => Err(CryptoError::unsupported_operation(self.algorithm(), "encrypt")),
        }
    }

    pub fn decrypt(&self, ciphertext: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        match self.encryptor() {
            Some(p) => p.decrypt(ciphertext, private_key),
            None => Err(CryptoError::unsupported_operation(self.algorithm(), "decrypt")),
        }
    }

    pub fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        match self {
            Provider::Dilithium(p) => p.sign(message, private_key),
            _ => Err(CryptoError::unsupported_operation(self.algorithm(), "sign")),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()> {
        match self {
            Provider::Dilithium(p) => p.verify(message, signature, public_key),
            _ => Err(CryptoError::unsupported_operation(self.algorithm(), "verify")),
        }
    }

    pub fn as_kem(&self) -> Option<&dyn KemCapable> {
        match self {
            Provider::MlKem(p) => Some(p as &dyn KemCapable),
            _ => None,
        }
    }

    pub fn as_hybrid(&self) -> Option<&HybridProvider> {
        match self {
            Provider::Hybrid(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_sphincs_is_not_implemented() {
        let err = Provider::new(AlgorithmId::SphincsPlus, &AgilityConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn test_capabilities_are_enforced() {
        let config = AgilityConfig::default();

        let ecdh = Provider::new(AlgorithmId::Ecdh, &config).unwrap();
        let err = ecdh.sign(b"msg", b"key").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(ecdh.as_kem().is_none());

        let dilithium = Provider::new(AlgorithmId::Dilithium, &config).unwrap();
        let keys = dilithium.generate_key_pair().unwrap();
        let err = dilithium.encrypt(b"msg", keys.public_key()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        let err = dilithium.decrypt(b"blob", keys.private_key()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_algorithm_reported_by_variant() {
        let config = AgilityConfig::default();
        for alg in [
            AlgorithmId::Ecdh,
            AlgorithmId::MlKem512,
            AlgorithmId::MlKem768,
            AlgorithmId::MlKem1024,
            AlgorithmId::Dilithium,
            AlgorithmId::HybridEcdhMlKem,
        ] {
            let provider = Provider::new(alg, &config).unwrap();
            assert_eq!(provider.algorithm(), alg);
            assert_eq!(provider.config().algorithm, alg);
        }
    }

    #[test]
    fn test_stronger_rsa_uses_strong_modulus() {
        let config = AgilityConfig::default();
        match Provider::stronger_rsa(&config).unwrap() {
            Provider::RsaOaep(rsa) => {
                assert_eq!(rsa.modulus_bits(), 4096);
                assert_eq!(rsa.max_plaintext_len(), 446);
            }
            other => panic!("unexpected provider {:?}", other.algorithm()),
        }
    }
}
