// API для отправки и получения сообщений
// Directory lookup -> провайдер алгоритма получателя -> sink

use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::factory::ProviderFactory;
use crate::crypto::keys::KeyManagementService;
use crate::error::{CryptoError, Result};
use crate::monitor::SecurityMonitor;
use crate::protocol::messages::{MessageKind, OutgoingEnvelope, PublicKeyExport};
use crate::utils::b64;
use crate::utils::time::Clock;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Внешний справочник публичных ключей
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Exported public key string of `user_id`, `None` when unknown.
    async fn lookup(&self, user_id: &str) -> Result<Option<String>>;
}

/// Внешний sink: доставка и хранение зашифрованных конвертов
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, message: OutgoingEnvelope) -> Result<()>;
}

/// Messaging call sites over the agility engine for one local user.
pub struct SecureMessenger {
    user_id: String,
    factory: Arc<ProviderFactory>,
    kms: Arc<KeyManagementService>,
    monitor: Option<Arc<SecurityMonitor>>,
    directory: Arc<dyn KeyDirectory>,
    sink: Arc<dyn MessageSink>,
    clock: Arc<dyn Clock>,
    identity_key_id: RwLock<Option<String>>,
}

impl std::fmt::Debug for SecureMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureMessenger")
            .field("user_id", &self.user_id)
            .field("identity_key_id", &self.identity_key_id())
            .finish_non_exhaustive()
    }
}

impl SecureMessenger {
    pub fn new(
        user_id: impl Into<String>,
        factory: Arc<ProviderFactory>,
        kms: Arc<KeyManagementService>,
        directory: Arc<dyn KeyDirectory>,
        sink: Arc<dyn MessageSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            factory,
            kms,
            monitor: None,
            directory,
            sink,
            clock,
            identity_key_id: RwLock::new(None),
        }
    }

    /// Quantum-vulnerable recipients are refused once the monitor's threat
    /// score crosses its guard level.
    pub fn with_monitor(mut self, monitor: Arc<SecurityMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn identity_key_id(&self) -> Option<String> {
        self.identity_key_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Generates a new identity key and returns its export string for the
    /// key directory. The previous identity key stays usable for decryption.
    pub fn create_identity(&self, algorithm: Option<AlgorithmId>) -> Result<String> {
        use tracing::info;

        let algorithm = match algorithm {
            Some(algorithm) => algorithm,
            None => self.factory.create_provider(None)?.algorithm(),
        };
        let key_id = self.kms.generate_key(algorithm)?;
        let export = self.export_for(&key_id)?;
        *self
            .identity_key_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(key_id.clone());

        info!(
            target: "api::messaging",
            user_id = %self.user_id,
            key_id = %key_id,
            algorithm = %algorithm,
            "Identity key created"
        );
        Ok(export)
    }

    /// Rotates the identity key and returns the new export string.
    pub fn rotate_identity(&self) -> Result<String> {
        let current = self
            .identity_key_id()
            .ok_or_else(|| CryptoError::KeyNotFound(format!("identity key of {}", self.user_id)))?;
        let new_id = self.kms.rotate_key(&current)?;
        let export = self.export_for(&new_id)?;
        *self.identity_key_id.write().unwrap_or_else(PoisonError::into_inner) = Some(new_id);
        Ok(export)
    }

    fn export_for(&self, key_id: &str) -> Result<String> {
        let metadata = self
            .kms
            .get_key_metadata(key_id)
            .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))?;
        let public_key = self
            .kms
            .get_public_key(key_id)
            .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))?;
        PublicKeyExport::new(key_id, metadata.algorithm, &public_key).to_export_string()
    }

    /// Encrypts `plaintext` for `receiver_id` under the algorithm of the
    /// receiver's published key and hands the envelope to the sink.
    pub async fn send_message(
        &self,
        receiver_id: &str,
        plaintext: &[u8],
        kind: MessageKind,
    ) -> Result<OutgoingEnvelope> {
        use tracing::info;

        let exported = self
            .directory
            .lookup(receiver_id)
            .await?
            .ok_or_else(|| CryptoError::KeyNotFound(format!("public key of {}", receiver_id)))?;
        let recipient = PublicKeyExport::from_export_string(&exported)?;

        if let Some(monitor) = &self.monitor {
            monitor.guard_algorithm(recipient.algorithm)?;
        }

        let provider = self.factory.provider_for(recipient.algorithm)?;
        let ciphertext = provider.encrypt(plaintext, &recipient.public_key_bytes()?)?;

        let message = OutgoingEnvelope {
            id: Uuid::new_v4().to_string(),
            sender_id: self.user_id.clone(),
            receiver_id: receiver_id.to_string(),
            key_id: recipient.key_id,
            algorithm: recipient.algorithm,
            envelope: b64::encode(&ciphertext),
            message_type: kind,
            timestamp: self.clock.now().timestamp(),
        };

        self.sink.deliver(message.clone()).await?;

        info!(
            target: "api::messaging",
            message_id = %message.id,
            receiver_id = %receiver_id,
            algorithm = %message.algorithm,
            bytes = ciphertext.len(),
            "Message sent"
        );
        Ok(message)
    }

    /// Decrypts an envelope addressed to this user with the key it names and
    /// records the key's usage.
    pub fn receive_message(&self, message: &OutgoingEnvelope) -> Result<Vec<u8>> {
        use tracing::debug;

        if message.receiver_id != self.user_id {
            return Err(CryptoError::InvalidOperation(format!(
                "message {} is addressed to {}",
                message.id, message.receiver_id
            )));
        }

        let keys = self
            .kms
            .get_key(&message.key_id)
            .ok_or_else(|| CryptoError::KeyNotFound(message.key_id.clone()))?;
        if keys.algorithm() != message.algorithm {
            return Err(CryptoError::decryption(message.algorithm));
        }

        let provider = self.factory.provider_for(message.algorithm)?;
        let plaintext = provider.decrypt(&message.ciphertext()?, keys.private_key())?;
        self.kms.record_key_usage(&message.key_id);

        debug!(
            target: "api::messaging",
            message_id = %message.id,
            key_id = %message.key_id,
            "Message decrypted"
        );
        Ok(plaintext)
    }
}
