//! Криптографический модуль
//!
//! # Архитектура
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Application / SecureMessenger               │
//! └─────────────────────────────────────────────────────────────┘
//!            │                    │                    │
//!            ▼                    ▼                    ▼
//! ┌────────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │  ProviderFactory   │ │ KeyManagement-   │ │ SecurityMonitor  │
//! │  - cache           │ │ Service          │ │ - threat score   │
//! │  - fallback chain  │ │ - lifecycle      │ │ - audit reports  │
//! │  - recommendation  │ │ - rotation       │ │                  │
//! └────────────────────┘ └──────────────────┘ └──────────────────┘
//!            │                    │
//!            └─────────┬──────────┘
//!                      ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Provider (Crypto-Agility, tagged union)        │
//! │  - RSA-OAEP, ECDH (envelope)                                │
//! │  - ML-KEM-512/768/1024, CRYSTALS-Dilithium                  │
//! │  - Hybrid-RSA-ML-KEM, Hybrid-ECDH-ML-KEM                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Модули
//!
//! ### Core
//! - [`algorithm`]: закрытый набор алгоритмов и их свойства
//! - [`provider`]: CryptoProvider + capability traits, enum [`Provider`]
//!
//! ### Implementations
//! - [`suites`]: конкретные провайдеры
//! - [`envelope`]: формат конверта ephemeral key ‖ nonce ‖ ciphertext
//!
//! ### Services
//! - [`factory`]: кэш провайдеров и цепочка fallback
//! - [`keys`]: жизненный цикл ключей
//! - [`policy`], [`events`]: политики ротации и журнал событий
//! - `master_key`: экспорт/импорт ключей под паролем

use crate::crypto::algorithm::{SecurityLevel, SecurityTier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub mod algorithm;
pub mod provider;
pub mod suites;
pub mod envelope;
pub mod factory;
pub mod policy;
pub mod events;
pub mod keys;
pub mod master_key;

pub use algorithm::AlgorithmId;
pub use provider::{CryptoProvider, KemCapable, Provider, SignatureCapable};

/// Пара ключей в сериализованном виде.
///
/// Формат байтов определяется алгоритмом (SPKI/PKCS#8 для классических,
/// сырые байты pqcrypto для ML-KEM и Dilithium, составной для гибридов).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)]
    algorithm: AlgorithmId,
    public_key: Vec<u8>,
    private_key: Vec<u8>,
}

impl KeyPair {
    pub fn new(algorithm: AlgorithmId, public_key: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            algorithm,
            public_key,
            private_key,
        }
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// Short SHA-256 fingerprint of the public half, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.public_key);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Возможности провайдера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Encryption,
    KeyEncapsulation,
    Signatures,
    HybridComposition,
    QuantumMigration,
}

/// Static description of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoConfig {
    pub algorithm: AlgorithmId,
    /// Public key size in bytes
    pub key_size: usize,
    pub security_level: SecurityLevel,
    pub security_tier: SecurityTier,
    pub quantum_safe: bool,
    pub features: Vec<Feature>,
}

impl CryptoConfig {
    pub(crate) fn describe(
        algorithm: AlgorithmId,
        key_size: usize,
        features: Vec<Feature>,
    ) -> Self {
        Self {
            algorithm,
            key_size,
            security_level: algorithm.security_level(),
            security_tier: algorithm.security_tier(),
            quantum_safe: algorithm.is_quantum_safe(),
            features,
        }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}
