//! Closed table of supported algorithms and their static properties.
//!
//! Every property here is a pure function of [`AlgorithmId`]; key metadata
//! copies these values at creation time and never recomputes them.

use crate::error::CryptoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlgorithmId {
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    #[serde(rename = "ECDH")]
    Ecdh,
    #[serde(rename = "ML-KEM-512")]
    MlKem512,
    #[serde(rename = "ML-KEM-768")]
    MlKem768,
    #[serde(rename = "ML-KEM-1024")]
    MlKem1024,
    #[serde(rename = "CRYSTALS-Dilithium")]
    Dilithium,
    #[serde(rename = "SPHINCS+")]
    SphincsPlus,
    #[serde(rename = "Hybrid-RSA-ML-KEM")]
    HybridRsaMlKem,
    #[serde(rename = "Hybrid-ECDH-ML-KEM")]
    HybridEcdhMlKem,
}

/// Квантовая стойкость алгоритма
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityLevel {
    QuantumVulnerable,
    QuantumResistant,
    QuantumSafe,
    Hybrid,
}

/// Грубая шкала стойкости
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityTier {
    Low,
    Medium,
    High,
    Maximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyUsage {
    Encryption,
    Signing,
    KeyExchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmFamily {
    Classical,
    PostQuantum,
    Hybrid,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 9] = [
        AlgorithmId::RsaOaep,
        AlgorithmId::Ecdh,
        AlgorithmId::MlKem512,
        AlgorithmId::MlKem768,
        AlgorithmId::MlKem1024,
        AlgorithmId::Dilithium,
        AlgorithmId::SphincsPlus,
        AlgorithmId::HybridRsaMlKem,
        AlgorithmId::HybridEcdhMlKem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmId::RsaOaep => "RSA-OAEP",
            AlgorithmId::Ecdh => "ECDH",
            AlgorithmId::MlKem512 => "ML-KEM-512",
            AlgorithmId::MlKem768 => "ML-KEM-768",
            AlgorithmId::MlKem1024 => "ML-KEM-1024",
            AlgorithmId::Dilithium => "CRYSTALS-Dilithium",
            AlgorithmId::SphincsPlus => "SPHINCS+",
            AlgorithmId::HybridRsaMlKem => "Hybrid-RSA-ML-KEM",
            AlgorithmId::HybridEcdhMlKem => "Hybrid-ECDH-ML-KEM",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            AlgorithmId::RsaOaep | AlgorithmId::Ecdh => AlgorithmFamily::Classical,
            AlgorithmId::MlKem512
            | AlgorithmId::MlKem768
            | AlgorithmId::MlKem1024
            | AlgorithmId::Dilithium
            | AlgorithmId::SphincsPlus => AlgorithmFamily::PostQuantum,
            AlgorithmId::HybridRsaMlKem | AlgorithmId::HybridEcdhMlKem => AlgorithmFamily::Hybrid,
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        match self {
            AlgorithmId::RsaOaep | AlgorithmId::Ecdh => SecurityLevel::QuantumVulnerable,
            AlgorithmId::MlKem512 => SecurityLevel::QuantumResistant,
            AlgorithmId::MlKem768
            | AlgorithmId::MlKem1024
            | AlgorithmId::Dilithium
            | AlgorithmId::SphincsPlus => SecurityLevel::QuantumSafe,
            AlgorithmId::HybridRsaMlKem | AlgorithmId::HybridEcdhMlKem => SecurityLevel::Hybrid,
        }
    }

    pub fn security_tier(&self) -> SecurityTier {
        match self {
            AlgorithmId::RsaOaep | AlgorithmId::Ecdh => SecurityTier::Low,
            AlgorithmId::MlKem512 => SecurityTier::Medium,
            AlgorithmId::MlKem768
            | AlgorithmId::Dilithium
            | AlgorithmId::HybridRsaMlKem
            | AlgorithmId::HybridEcdhMlKem => SecurityTier::High,
            AlgorithmId::MlKem1024 | AlgorithmId::SphincsPlus => SecurityTier::Maximum,
        }
    }

    /// Hybrid schemes count as quantum-safe: they hold as long as the
    /// post-quantum half holds.
    pub fn is_quantum_safe(&self) -> bool {
        self.security_level() != SecurityLevel::QuantumVulnerable
    }

    pub fn is_nist_approved(&self) -> bool {
        match self {
            // FIPS 203 / 204 / 205
            AlgorithmId::MlKem512
            | AlgorithmId::MlKem768
            | AlgorithmId::MlKem1024
            | AlgorithmId::Dilithium
            | AlgorithmId::SphincsPlus => true,
            // SP 800-56B / SP 800-56A
            AlgorithmId::RsaOaep | AlgorithmId::Ecdh => true,
            AlgorithmId::HybridRsaMlKem | AlgorithmId::HybridEcdhMlKem => false,
        }
    }

    pub fn key_usage(&self) -> KeyUsage {
        match self {
            AlgorithmId::RsaOaep | AlgorithmId::HybridRsaMlKem => KeyUsage::Encryption,
            AlgorithmId::Dilithium | AlgorithmId::SphincsPlus => KeyUsage::Signing,
            AlgorithmId::Ecdh
            | AlgorithmId::MlKem512
            | AlgorithmId::MlKem768
            | AlgorithmId::MlKem1024
            | AlgorithmId::HybridEcdhMlKem => KeyUsage::KeyExchange,
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmId::ALL
            .iter()
            .copied()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CryptoError::AlgorithmNotSupported(s.to_string()))
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityLevel::QuantumVulnerable => "quantum-vulnerable",
            SecurityLevel::QuantumResistant => "quantum-resistant",
            SecurityLevel::QuantumSafe => "quantum-safe",
            SecurityLevel::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for alg in AlgorithmId::ALL {
            assert_eq!(alg.as_str().parse::<AlgorithmId>().unwrap(), alg);
            let json = serde_json::to_string(&alg).unwrap();
            assert_eq!(json, format!("\"{}\"", alg.as_str()));
        }
        assert!("DES".parse::<AlgorithmId>().is_err());
    }

    #[test]
    fn test_quantum_safety_table() {
        assert!(!AlgorithmId::RsaOaep.is_quantum_safe());
        assert!(!AlgorithmId::Ecdh.is_quantum_safe());
        assert!(AlgorithmId::MlKem512.is_quantum_safe());
        assert!(AlgorithmId::HybridEcdhMlKem.is_quantum_safe());
        assert_eq!(AlgorithmId::MlKem512.security_level(), SecurityLevel::QuantumResistant);
        assert_eq!(AlgorithmId::HybridRsaMlKem.security_level(), SecurityLevel::Hybrid);
        assert_eq!(AlgorithmId::MlKem1024.security_tier(), SecurityTier::Maximum);
    }

    #[test]
    fn test_key_usage_by_family() {
        assert_eq!(AlgorithmId::Dilithium.key_usage(), KeyUsage::Signing);
        assert_eq!(AlgorithmId::RsaOaep.key_usage(), KeyUsage::Encryption);
        assert_eq!(AlgorithmId::MlKem768.key_usage(), KeyUsage::KeyExchange);
        assert!(!AlgorithmId::HybridEcdhMlKem.is_nist_approved());
    }
}
