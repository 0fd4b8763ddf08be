// Типы сообщений, которые движок отдаёт наружу
// Relay и хранилище видят только эти структуры, без открытого текста

use crate::crypto::algorithm::AlgorithmId;
use crate::error::{CryptoError, Result};
use crate::utils::b64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    System,
}

/// Зашифрованное сообщение для передачи в sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEnvelope {
    /// UUID v4 идентификатор сообщения
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Id ключа получателя, под который зашифровано сообщение
    pub key_id: String,
    pub algorithm: AlgorithmId,
    /// Base64 encoded ciphertext blob
    pub envelope: String,
    pub message_type: MessageKind,
    /// Unix timestamp в секундах
    pub timestamp: i64,
}

impl OutgoingEnvelope {
    pub fn ciphertext(&self) -> Result<Vec<u8>> {
        b64::decode(&self.envelope).map_err(|_| CryptoError::decryption(self.algorithm))
    }
}

/// Экспортированный публичный ключ (строка в key directory)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyExport {
    pub key_id: String,
    pub algorithm: AlgorithmId,
    /// Base64 public key bytes
    pub public_key: String,
}

impl PublicKeyExport {
    pub fn new(key_id: impl Into<String>, algorithm: AlgorithmId, public_key: &[u8]) -> Self {
        Self {
            key_id: key_id.into(),
            algorithm,
            public_key: b64::encode(public_key),
        }
    }

    pub fn to_export_string(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CryptoError::InvalidOperation(format!("Public key export failed: {}", e)))
    }

    pub fn from_export_string(exported: &str) -> Result<Self> {
        serde_json::from_str(exported).map_err(|e| {
            CryptoError::InvalidOperation(format!("Malformed public key export: {}", e))
        })
    }

    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        b64::decode(&self.public_key).map_err(|e| {
            CryptoError::encryption(self.algorithm, format!("malformed public key: {}", e))
        })
    }
}
