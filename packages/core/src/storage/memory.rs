// In-memory коллабораторы для тестов и встраивания без бэкенда

use crate::api::messaging::{KeyDirectory, MessageSink};
use crate::error::Result;
use crate::monitor::audit::{MessageStats, MessageStatsSource};
use crate::protocol::messages::OutgoingEnvelope;
use crate::protocol::wire;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

/// In-memory key directory: user id -> exported public key string
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    keys: RwLock<HashMap<String, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, user_id: &str, exported_key: String) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), exported_key);
    }

    pub fn remove(&self, user_id: &str) -> bool {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id)
            .is_some()
    }
}

#[async_trait]
impl KeyDirectory for MemoryDirectory {
    async fn lookup(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned())
    }
}

/// In-memory relay: хранит упакованные (MessagePack) конверты
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Все конверты в порядке доставки
    pub fn delivered(&self) -> Result<Vec<OutgoingEnvelope>> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|packed| wire::unpack_envelope(packed))
            .collect()
    }

    /// Конверты для конкретного получателя
    pub fn inbox(&self, receiver_id: &str) -> Result<Vec<OutgoingEnvelope>> {
        Ok(self
            .delivered()?
            .into_iter()
            .filter(|m| m.receiver_id == receiver_id)
            .collect())
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn deliver(&self, message: OutgoingEnvelope) -> Result<()> {
        let packed = wire::pack_envelope(&message)?;
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(packed);
        Ok(())
    }
}

impl MessageStatsSource for MemorySink {
    fn message_stats(&self) -> MessageStats {
        use tracing::warn;

        let mut stats = MessageStats::default();
        let delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        // Нераспаковываемые записи пропускаются по одной
        for (index, packed) in delivered.iter().enumerate() {
            match wire::unpack_envelope(packed) {
                Ok(message) => stats.record(message.algorithm, 1),
                Err(e) => warn!(
                    target: "storage::memory",
                    index,
                    error = %e,
                    "Skipping unreadable envelope in stats"
                ),
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::algorithm::AlgorithmId;
    use crate::protocol::messages::MessageKind;

    fn envelope(receiver: &str, algorithm: AlgorithmId) -> OutgoingEnvelope {
        OutgoingEnvelope {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: "alice".to_string(),
            receiver_id: receiver.to_string(),
            key_id: "k1".to_string(),
            algorithm,
            envelope: String::new(),
            message_type: MessageKind::Text,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = MemoryDirectory::new();
        directory.publish("bob", "exported".to_string());
        assert_eq!(directory.lookup("bob").await.unwrap().as_deref(), Some("exported"));
        assert_eq!(directory.lookup("carol").await.unwrap(), None);
        assert!(directory.remove("bob"));
    }

    #[tokio::test]
    async fn test_sink_inbox_and_stats() {
        let sink = MemorySink::new();
        sink.deliver(envelope("bob", AlgorithmId::Ecdh)).await.unwrap();
        sink.deliver(envelope("bob", AlgorithmId::MlKem768)).await.unwrap();
        sink.deliver(envelope("carol", AlgorithmId::HybridEcdhMlKem)).await.unwrap();

        assert_eq!(sink.inbox("bob").unwrap().len(), 2);
        let stats = sink.message_stats();
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.quantum_vulnerable(), 1);
        assert_eq!(stats.hybrid(), 1);
    }

    #[tokio::test]
    async fn test_stats_skip_only_unreadable_records() {
        let sink = MemorySink::new();
        sink.deliver(envelope("bob", AlgorithmId::Ecdh)).await.unwrap();
        sink.delivered.lock().unwrap().push(vec![0xc1, 0x00, 0xff]);
        sink.deliver(envelope("bob", AlgorithmId::MlKem1024)).await.unwrap();

        assert!(sink.delivered().is_err());
        let stats = sink.message_stats();
        assert_eq!(stats.total(), 2);
        assert_eq!(stats.quantum_vulnerable(), 1);
        assert_eq!(stats.quantum_safe(), 1);
    }
}
