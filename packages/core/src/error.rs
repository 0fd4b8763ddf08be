use crate::crypto::algorithm::AlgorithmId;
use thiserror::Error;

/// Kind of a [`CryptoError`], without the attached context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlgorithmNotSupported,
    KeyGenerationFailed,
    EncryptionFailed,
    DecryptionFailed,
    QuantumThreatDetected,
    NistComplianceViolation,
    HybridModeFailure,
    NotImplemented,
    InvalidOperation,
    SignatureFailed,
    KeyNotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Algorithm not supported: {0}")]
    AlgorithmNotSupported(String),
    #[error("Failed to generate keys ({algorithm}): {reason}")]
    KeyGenerationFailed { algorithm: AlgorithmId, reason: String },
    #[error("Encryption failed ({algorithm}): {reason}")]
    EncryptionFailed { algorithm: AlgorithmId, reason: String },
    // Причина намеренно не сохраняется: без оракула по типу ошибки
    #[error("Decryption failed ({algorithm})")]
    DecryptionFailed { algorithm: AlgorithmId },
    #[error("Quantum threat detected: {0}")]
    QuantumThreatDetected(String),
    #[error("NIST compliance violation: {0}")]
    NistComplianceViolation(String),
    #[error("Hybrid mode failure ({algorithm}): {reason}")]
    HybridModeFailure { algorithm: AlgorithmId, reason: String },
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Signature operation failed ({algorithm}): {reason}")]
    SignatureFailed { algorithm: AlgorithmId, reason: String },
    #[error("Key not found: {0}")]
    KeyNotFound(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::AlgorithmNotSupported(_) => ErrorKind::AlgorithmNotSupported,
            CryptoError::KeyGenerationFailed { .. } => ErrorKind::KeyGenerationFailed,
            CryptoError::EncryptionFailed { .. } => ErrorKind::EncryptionFailed,
            CryptoError::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            CryptoError::QuantumThreatDetected(_) => ErrorKind::QuantumThreatDetected,
            CryptoError::NistComplianceViolation(_) => ErrorKind::NistComplianceViolation,
            CryptoError::HybridModeFailure { .. } => ErrorKind::HybridModeFailure,
            CryptoError::NotImplemented(_) => ErrorKind::NotImplemented,
            CryptoError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            CryptoError::SignatureFailed { .. } => ErrorKind::SignatureFailed,
            CryptoError::KeyNotFound(_) => ErrorKind::KeyNotFound,
        }
    }

    pub fn key_generation(algorithm: AlgorithmId, reason: impl ToString) -> Self {
        CryptoError::KeyGenerationFailed {
            algorithm,
            reason: reason.to_string(),
        }
    }

    pub fn encryption(algorithm: AlgorithmId, reason: impl ToString) -> Self {
        CryptoError::EncryptionFailed {
            algorithm,
            reason: reason.to_string(),
        }
    }

    pub fn decryption(algorithm: AlgorithmId) -> Self {
        CryptoError::DecryptionFailed { algorithm }
    }

    pub fn signature(algorithm: AlgorithmId, reason: impl ToString) -> Self {
        CryptoError::SignatureFailed {
            algorithm,
            reason: reason.to_string(),
        }
    }

    pub fn hybrid(algorithm: AlgorithmId, reason: impl ToString) -> Self {
        CryptoError::HybridModeFailure {
            algorithm,
            reason: reason.to_string(),
        }
    }

    /// Операция не поддерживается данным провайдером
    pub fn unsupported_operation(algorithm: AlgorithmId, operation: &str) -> Self {
        CryptoError::InvalidOperation(format!("{} does not support {}", algorithm, operation))
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
