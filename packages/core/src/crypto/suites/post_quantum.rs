//! ML-KEM provider family backed by `pqcrypto-kyber`.
//!
//! `encrypt` is KEM-DEM: encapsulate against the recipient key, derive a
//! ChaCha20-Poly1305 key from the shared secret, and ship
//! `kem_ciphertext ‖ nonce ‖ ciphertext ‖ tag`.

use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::provider::{CryptoProvider, EncryptionCapable, KemCapable};
use crate::crypto::suites::{derive_aead_key, open_payload, seal_payload};
use crate::crypto::{CryptoConfig, Feature, KeyPair};
use crate::error::{CryptoError, Result};
use pqcrypto_kyber::{kyber1024, kyber512, kyber768};
use pqcrypto_traits::kem::{Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _};
use zeroize::Zeroizing;

pub const SHARED_SECRET_LEN: usize = 32;

const KEM_DEM_INFO: &[u8] = b"construct-mlkem-dem-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MlKemParameterSet {
    MlKem512,
    MlKem768,
    MlKem1024,
}

impl MlKemParameterSet {
    pub fn algorithm(&self) -> AlgorithmId {
        match self {
            MlKemParameterSet::MlKem512 => AlgorithmId::MlKem512,
            MlKemParameterSet::MlKem768 => AlgorithmId::MlKem768,
            MlKemParameterSet::MlKem1024 => AlgorithmId::MlKem1024,
        }
    }

    pub fn public_key_len(&self) -> usize {
        match self {
            MlKemParameterSet::MlKem512 => 800,
            MlKemParameterSet::MlKem768 => 1184,
            MlKemParameterSet::MlKem1024 => 1568,
        }
    }

    pub fn ciphertext_len(&self) -> usize {
        match self {
            MlKemParameterSet::MlKem512 => 768,
            MlKemParameterSet::MlKem768 => 1088,
            MlKemParameterSet::MlKem1024 => 1568,
        }
    }

    fn keypair(&self) -> (Vec<u8>, Vec<u8>) {
        match self {
            MlKemParameterSet::MlKem512 => {
                let (pk, sk) = kyber512::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            MlKemParameterSet::MlKem768 => {
                let (pk, sk) = kyber768::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            MlKemParameterSet::MlKem1024 => {
                let (pk, sk) = kyber1024::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
        }
    }

    fn encapsulate(&self, public_key: &[u8]) -> Option<(Vec<u8>, Zeroizing<Vec<u8>>)> {
        match self {
            MlKemParameterSet::MlKem512 => {
                let pk = kyber512::PublicKey::from_bytes(public_key).ok()?;
                let (ss, ct) = kyber512::encapsulate(&pk);
                Some((ct.as_bytes().to_vec(), Zeroizing::new(ss.as_bytes().to_vec())))
            }
            MlKemParameterSet::MlKem768 => {
                let pk = kyber768::PublicKey::from_bytes(public_key).ok()?;
                let (ss, ct) = kyber768::encapsulate(&pk);
                Some((ct.as_bytes().to_vec(), Zeroizing::new(ss.as_bytes().to_vec())))
            }
            MlKemParameterSet::MlKem1024 => {
                let pk = kyber1024::PublicKey::from_bytes(public_key).ok()?;
                let (ss, ct) = kyber1024::encapsulate(&pk);
                Some((ct.as_bytes().to_vec(), Zeroizing::new(ss.as_bytes().to_vec())))
            }
        }
    }

    fn decapsulate(&self, private_key: &[u8], ciphertext: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        match self {
            MlKemParameterSet::MlKem512 => {
                let sk = kyber512::SecretKey::from_bytes(private_key).ok()?;
                let ct = kyber512::Ciphertext::from_bytes(ciphertext).ok()?;
                Some(Zeroizing::new(kyber512::decapsulate(&ct, &sk).as_bytes().to_vec()))
            }
            MlKemParameterSet::MlKem768 => {
                let sk = kyber768::SecretKey::from_bytes(private_key).ok()?;
                let ct = kyber768::Ciphertext::from_bytes(ciphertext).ok()?;
                Some(Zeroizing::new(kyber768::decapsulate(&ct, &sk).as_bytes().to_vec()))
            }
            MlKemParameterSet::MlKem1024 => {
                let sk = kyber1024::SecretKey::from_bytes(private_key).ok()?;
                let ct = kyber1024::Ciphertext::from_bytes(ciphertext).ok()?;
                Some(Zeroizing::new(kyber1024::decapsulate(&ct, &sk).as_bytes().to_vec()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MlKemProvider {
    params: MlKemParameterSet,
}

impl MlKemProvider {
    pub fn new(params: MlKemParameterSet) -> Self {
        Self { params }
    }

    pub fn parameter_set(&self) -> MlKemParameterSet {
        self.params
    }
}

impl CryptoProvider for MlKemProvider {
    fn algorithm(&self) -> AlgorithmId {
        self.params.algorithm()
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        let (public_key, private_key) = self.params.keypair();
        if public_key.len() != self.params.public_key_len() {
            return Err(CryptoError::key_generation(
                self.algorithm(),
                format!("unexpected public key length {}", public_key.len()),
            ));
        }
        Ok(KeyPair::new(self.algorithm(), public_key, private_key))
    }

    fn config(&self) -> CryptoConfig {
        CryptoConfig::describe(
            self.algorithm(),
            self.params.public_key_len(),
            vec![Feature::Encryption, Feature::KeyEncapsulation],
        )
    }
}

impl KemCapable for MlKemProvider {
    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>)> {
        if public_key.len() != self.params.public_key_len() {
            return Err(CryptoError::encryption(
                self.algorithm(),
                format!(
                    "public key must be {} bytes, got {}",
                    self.params.public_key_len(),
                    public_key.len()
                ),
            ));
        }
        self.params
            .encapsulate(public_key)
            .ok_or_else(|| CryptoError::encryption(self.algorithm(), "malformed public key"))
    }

    fn decapsulate(&self, private_key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if ciphertext.len() != self.params.ciphertext_len() {
            return Err(CryptoError::decryption(self.algorithm()));
        }
        self.params
            .decapsulate(private_key, ciphertext)
            .ok_or_else(|| CryptoError::decryption(self.algorithm()))
    }
}

impl EncryptionCapable for MlKemProvider {
    fn encrypt(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>> {
        let (kem_ciphertext, shared_secret) = self.encapsulate(recipient_public_key)?;
        let key = derive_aead_key(&shared_secret, &kem_ciphertext, KEM_DEM_INFO)
            .ok_or_else(|| CryptoError::encryption(self.algorithm(), "key derivation failed"))?;
        let sealed = seal_payload(&key, plaintext, &kem_ciphertext)
            .ok_or_else(|| CryptoError::encryption(self.algorithm(), "AEAD encryption failed"))?;

        let mut blob = kem_ciphertext;
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    fn decrypt(&self, ciphertext: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        let ct_len = self.params.ciphertext_len();
        if ciphertext.len() < ct_len {
            return Err(CryptoError::decryption(self.algorithm()));
        }
        let (kem_ciphertext, sealed) = ciphertext.split_at(ct_len);
        let shared_secret = self.decapsulate(private_key, kem_ciphertext)?;
        let key = derive_aead_key(&shared_secret, kem_ciphertext, KEM_DEM_INFO)
            .ok_or_else(|| CryptoError::decryption(self.algorithm()))?;
        open_payload(&key, sealed, kem_ciphertext)
            .ok_or_else(|| CryptoError::decryption(self.algorithm()))
    }
}
