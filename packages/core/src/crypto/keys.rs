// Управление ключами
// Метаданные, материал, политики ротации и журнал событий жизненного цикла

use crate::config::AgilityConfig;
use crate::crypto::algorithm::{AlgorithmId, KeyUsage, SecurityLevel};
use crate::crypto::events::{EventBus, EventKind, KeyLifecycleEvent, ListenerId};
use crate::crypto::factory::ProviderFactory;
use crate::crypto::master_key::{self, SealedKey};
use crate::crypto::policy::{default_policies, RotationPolicy};
use crate::crypto::KeyPair;
use crate::error::{CryptoError, Result};
use crate::monitor::threat::ThreatGauge;
use crate::utils::serialization;
use crate::utils::time::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Rotating,
    Revoked,
    Expired,
}

/// Метаданные ключа. Алгоритм и производные от него поля не меняются
/// после создания.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    pub id: String,
    pub algorithm: AlgorithmId,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub quantum_safe: bool,
    pub security_level: SecurityLevel,
    pub usage: KeyUsage,
    pub status: KeyStatus,
    pub usage_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyHealthReport {
    pub total: usize,
    pub active: usize,
    pub quantum_safe: usize,
    pub quantum_vulnerable: usize,
    pub expiring_soon: usize,
    pub need_rotation: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedKey {
    pub old_key_id: String,
    pub new_key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationFailure {
    pub key_id: String,
    pub error: CryptoError,
}

/// Result of one rotation sweep. Per-key failures never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated: Vec<RotatedKey>,
    pub failed: Vec<RotationFailure>,
    pub expired: Vec<String>,
}

/// Сериализуемый снимок состояния (без ключевого материала)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KmsSnapshot {
    sequence: u64,
    keys: Vec<KeyMetadata>,
    events: Vec<KeyLifecycleEvent>,
    policies: Vec<(AlgorithmId, RotationPolicy)>,
}

#[derive(Default)]
struct KeyStore {
    /// BTreeMap: порядок id совпадает с порядком генерации
    metadata: BTreeMap<String, KeyMetadata>,
    material: HashMap<String, KeyPair>,
    events: Vec<KeyLifecycleEvent>,
    policies: BTreeMap<AlgorithmId, RotationPolicy>,
}

/// Key lifecycle service: generation, rotation, revocation, expiry and the
/// audit trail.
pub struct KeyManagementService {
    factory: Arc<ProviderFactory>,
    threat: ThreatGauge,
    clock: Arc<dyn Clock>,
    config: AgilityConfig,
    store: RwLock<KeyStore>,
    /// Сериализация rotate/revoke по id ключа
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    listeners: EventBus,
    sequence: AtomicU64,
}

impl std::fmt::Debug for KeyManagementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManagementService")
            .field("keys", &self.read_store().metadata.len())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl KeyManagementService {
    pub fn new(factory: Arc<ProviderFactory>, threat: ThreatGauge, clock: Arc<dyn Clock>) -> Self {
        let config = factory.engine_config().clone();
        Self {
            factory,
            threat,
            clock,
            config,
            store: RwLock::new(KeyStore {
                policies: default_policies(),
                ..KeyStore::default()
            }),
            key_locks: Mutex::new(HashMap::new()),
            listeners: EventBus::new(),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn factory(&self) -> &Arc<ProviderFactory> {
        &self.factory
    }

    fn read_store(&self) -> std::sync::RwLockReadGuard<'_, KeyStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> std::sync::RwLockWriteGuard<'_, KeyStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_lock(&self, key_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key_id.to_string()).or_default())
    }

    /// Блокировка не нужна отозванным и неизвестным ключам
    fn release_key_lock_if_final(&self, key_id: &str) {
        let finished = self
            .read_store()
            .metadata
            .get(key_id)
            .map_or(true, |m| m.status == KeyStatus::Revoked);
        if finished {
            self.key_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key_id);
        }
    }

    /// `k{seq:012}-{8 hex}`: lexical order is generation order.
    fn next_key_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let suffix = Uuid::new_v4().simple().to_string();
        format!("k{:012}-{}", seq, &suffix[..8])
    }

    fn new_metadata(
        &self,
        id: String,
        algorithm: AlgorithmId,
        now: DateTime<Utc>,
        policy: &RotationPolicy,
    ) -> KeyMetadata {
        let expires_at = chrono::Duration::from_std(policy.max_age)
            .ok()
            .and_then(|age| now.checked_add_signed(age));
        KeyMetadata {
            id,
            algorithm,
            created_at: now,
            last_used: None,
            rotated_at: None,
            expires_at,
            quantum_safe: algorithm.is_quantum_safe(),
            security_level: algorithm.security_level(),
            usage: algorithm.key_usage(),
            status: KeyStatus::Active,
            usage_count: 0,
        }
    }

    fn event(
        &self,
        key_id: &str,
        kind: EventKind,
        algorithm: AlgorithmId,
        details: impl Into<String>,
        previous_key_id: Option<String>,
    ) -> KeyLifecycleEvent {
        KeyLifecycleEvent {
            key_id: key_id.to_string(),
            kind,
            timestamp: self.clock.now(),
            algorithm,
            details: details.into(),
            previous_key_id,
        }
    }

    /// Журнал пополняется под блокировкой, слушатели вызываются после неё.
    fn publish(&self, event: KeyLifecycleEvent) {
        self.write_store().events.push(event.clone());
        self.listeners.emit(&event);
    }

    fn generate_material(&self, algorithm: AlgorithmId) -> Result<KeyPair> {
        let provider = self.factory.provider_for(algorithm)?;
        provider.generate_key_pair()
    }

    /// Stores `keys` as a new active key and emits `created`.
    fn insert_key(&self, keys: KeyPair, details: &str) -> String {
        use tracing::info;

        let algorithm = keys.algorithm();
        let now = self.clock.now();
        let id = self.next_key_id();
        let fingerprint = keys.fingerprint();
        {
            let mut store = self.write_store();
            let policy = store
                .policies
                .get(&algorithm)
                .copied()
                .unwrap_or_else(|| RotationPolicy::default_for(algorithm));
            let metadata = self.new_metadata(id.clone(), algorithm, now, &policy);
            store.metadata.insert(id.clone(), metadata);
            store.material.insert(id.clone(), keys);
        }

        info!(
            target: "crypto::keys",
            key_id = %id,
            algorithm = %algorithm,
            fingerprint = %fingerprint,
            "Key created"
        );
        self.publish(self.event(&id, EventKind::Created, algorithm, details, None));
        id
    }

    /// Generates a key through the `algorithm` provider and returns its id.
    pub fn generate_key(&self, algorithm: AlgorithmId) -> Result<String> {
        let keys = self.generate_material(algorithm)?;
        Ok(self.insert_key(keys, "Key generated"))
    }

    /// Replaces `key_id` with a fresh key of the same algorithm.
    ///
    /// The replacement is generated first; the source key turns `rotating`
    /// only once it exists. Old material stays available until revocation.
    pub fn rotate_key(&self, key_id: &str) -> Result<String> {
        let lock = self.key_lock(key_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = self.rotate_locked(key_id);
        if result.is_err() {
            self.release_key_lock_if_final(key_id);
        }
        result
    }

    fn rotate_locked(&self, key_id: &str) -> Result<String> {
        use tracing::info;

        let algorithm = self.rotatable(key_id)?;
        let keys = self.generate_material(algorithm)?;
        let now = self.clock.now();
        let new_id = self.next_key_id();

        {
            let mut store = self.write_store();
            let policy = store
                .policies
                .get(&algorithm)
                .copied()
                .unwrap_or_else(|| RotationPolicy::default_for(algorithm));
            let metadata = self.new_metadata(new_id.clone(), algorithm, now, &policy);

            let source = store
                .metadata
                .get_mut(key_id)
                .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))?;
            source.status = KeyStatus::Rotating;
            source.rotated_at = Some(now);

            store.metadata.insert(new_id.clone(), metadata);
            store.material.insert(new_id.clone(), keys);
        }

        info!(
            target: "crypto::keys",
            old_key_id = %key_id,
            new_key_id = %new_id,
            algorithm = %algorithm,
            "Key rotated"
        );
        self.publish(self.event(
            &new_id,
            EventKind::Rotated,
            algorithm,
            format!("Rotated from {}", key_id),
            Some(key_id.to_string()),
        ));
        Ok(new_id)
    }

    fn rotatable(&self, key_id: &str) -> Result<AlgorithmId> {
        let store = self.read_store();
        let metadata = store
            .metadata
            .get(key_id)
            .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))?;
        match metadata.status {
            KeyStatus::Revoked => Err(CryptoError::InvalidOperation(format!(
                "key {} is revoked",
                key_id
            ))),
            KeyStatus::Rotating => Err(CryptoError::InvalidOperation(format!(
                "key {} is already rotating",
                key_id
            ))),
            KeyStatus::Active | KeyStatus::Expired => Ok(metadata.algorithm),
        }
    }

    /// Revokes `key_id` and deletes its material at once. Irreversible.
    pub fn revoke_key(&self, key_id: &str) -> Result<()> {
        let lock = self.key_lock(key_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = self.revoke_locked(key_id);
        self.release_key_lock_if_final(key_id);
        result
    }

    fn revoke_locked(&self, key_id: &str) -> Result<()> {
        use tracing::info;

        let algorithm = {
            let mut store = self.write_store();
            let metadata = store
                .metadata
                .get_mut(key_id)
                .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))?;
            if metadata.status == KeyStatus::Revoked {
                return Err(CryptoError::InvalidOperation(format!(
                    "key {} is already revoked",
                    key_id
                )));
            }
            metadata.status = KeyStatus::Revoked;
            let algorithm = metadata.algorithm;
            // KeyPair обнуляется при drop
            store.material.remove(key_id);
            algorithm
        };

        info!(target: "crypto::keys", key_id = %key_id, algorithm = %algorithm, "Key revoked");
        self.publish(self.event(key_id, EventKind::Revoked, algorithm, "Key revoked", None));
        Ok(())
    }

    fn needs_rotation(
        &self,
        metadata: &KeyMetadata,
        policy: &RotationPolicy,
        now: DateTime<Utc>,
        threat: u8,
    ) -> bool {
        if metadata.status != KeyStatus::Active {
            return false;
        }
        let expired = metadata.expires_at.map_or(false, |at| at <= now);
        let threatened = threat >= policy.quantum_threat_threshold && !metadata.quantum_safe;
        let worn_out = metadata.usage_count >= policy.max_usage_count;
        expired || threatened || worn_out
    }

    /// Active keys that are past expiry, over their usage budget, or not
    /// quantum-safe while the threat score meets their policy threshold.
    pub fn check_key_rotation_needs(&self) -> Vec<String> {
        let now = self.clock.now();
        let threat = self.threat.score();
        let store = self.read_store();

        store
            .metadata
            .values()
            .filter(|metadata| {
                let policy = store
                    .policies
                    .get(&metadata.algorithm)
                    .copied()
                    .unwrap_or_else(|| RotationPolicy::default_for(metadata.algorithm));
                self.needs_rotation(metadata, &policy, now, threat)
            })
            .map(|metadata| metadata.id.clone())
            .collect()
    }

    fn is_past_expiry(&self, key_id: &str, now: DateTime<Utc>) -> bool {
        self.read_store()
            .metadata
            .get(key_id)
            .and_then(|m| m.expires_at)
            .map_or(false, |at| at <= now)
    }

    fn auto_rotates(&self, key_id: &str) -> bool {
        let store = self.read_store();
        store
            .metadata
            .get(key_id)
            .and_then(|m| store.policies.get(&m.algorithm))
            .map_or(true, |policy| policy.auto_rotate)
    }

    /// Rotates every flagged key. Keys whose policy disables auto-rotation
    /// are moved to `expired` once past expiry and left alone otherwise.
    pub fn perform_scheduled_rotations(&self) -> RotationReport {
        self.sweep(|id| self.rotate_key(id))
    }

    fn sweep<F>(&self, mut rotate: F) -> RotationReport
    where
        F: FnMut(&str) -> Result<String>,
    {
        use tracing::{info, warn};

        let now = self.clock.now();
        let mut report = RotationReport::default();

        for key_id in self.check_key_rotation_needs() {
            if !self.auto_rotates(&key_id) {
                if self.is_past_expiry(&key_id, now) && self.mark_expired(&key_id) {
                    report.expired.push(key_id);
                }
                continue;
            }

            match rotate(&key_id) {
                Ok(new_key_id) => report.rotated.push(RotatedKey {
                    old_key_id: key_id,
                    new_key_id,
                }),
                Err(error) => {
                    warn!(
                        target: "crypto::keys",
                        key_id = %key_id,
                        error = %error,
                        "Scheduled rotation failed"
                    );
                    report.failed.push(RotationFailure { key_id, error });
                }
            }
        }

        info!(
            target: "crypto::keys",
            rotated = report.rotated.len(),
            failed = report.failed.len(),
            expired = report.expired.len(),
            "Rotation sweep finished"
        );
        report
    }

    /// Same sweep as [`perform_scheduled_rotations`](Self::perform_scheduled_rotations),
    /// but each rotation runs on the blocking pool under `timeout`. A key that
    /// times out is reported as failed and the sweep moves on.
    pub async fn perform_scheduled_rotations_with_timeout(
        self: &Arc<Self>,
        timeout: Duration,
    ) -> RotationReport {
        use tracing::warn;

        let mut report = RotationReport::default();
        let now = self.clock.now();

        for key_id in self.check_key_rotation_needs() {
            if !self.auto_rotates(&key_id) {
                if self.is_past_expiry(&key_id, now) && self.mark_expired(&key_id) {
                    report.expired.push(key_id);
                }
                continue;
            }

            let kms = Arc::clone(self);
            let id = key_id.clone();
            let task = tokio::task::spawn_blocking(move || kms.rotate_key(&id));

            let outcome = match tokio::time::timeout(timeout, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(CryptoError::InvalidOperation(format!(
                    "rotation task for {} aborted: {}",
                    key_id, join_error
                ))),
                Err(_) => Err(CryptoError::key_generation(
                    self.algorithm_of(&key_id).unwrap_or(AlgorithmId::Ecdh),
                    format!("rotation of {} timed out after {:?}", key_id, timeout),
                )),
            };

            match outcome {
                Ok(new_key_id) => report.rotated.push(RotatedKey {
                    old_key_id: key_id,
                    new_key_id,
                }),
                Err(error) => {
                    warn!(
                        target: "crypto::keys",
                        key_id = %key_id,
                        error = %error,
                        "Scheduled rotation failed"
                    );
                    report.failed.push(RotationFailure { key_id, error });
                }
            }
        }
        report
    }

    fn algorithm_of(&self, key_id: &str) -> Option<AlgorithmId> {
        self.read_store().metadata.get(key_id).map(|m| m.algorithm)
    }

    fn mark_expired(&self, key_id: &str) -> bool {
        use tracing::info;

        let algorithm = {
            let mut store = self.write_store();
            match store.metadata.get_mut(key_id) {
                Some(metadata) if metadata.status == KeyStatus::Active => {
                    metadata.status = KeyStatus::Expired;
                    metadata.algorithm
                }
                _ => return false,
            }
        };

        info!(target: "crypto::keys", key_id = %key_id, algorithm = %algorithm, "Key expired");
        let event =
            self.event(key_id, EventKind::Expired, algorithm, "Key passed its expiry", None);
        self.publish(event);
        true
    }

    /// Moves active, non-auto-rotating keys past their expiry to `expired`.
    pub fn expire_stale_keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let candidates: Vec<String> = self
            .read_store()
            .metadata
            .values()
            .filter(|m| {
                m.status == KeyStatus::Active && m.expires_at.map_or(false, |at| at <= now)
            })
            .map(|m| m.id.clone())
            .collect();

        candidates
            .into_iter()
            .filter(|id| !self.auto_rotates(id) && self.mark_expired(id))
            .collect()
    }

    /// Stamps `lastUsed` and emits `used`. Unknown ids are ignored.
    pub fn record_key_usage(&self, key_id: &str) {
        use tracing::debug;

        let now = self.clock.now();
        let algorithm = {
            let mut store = self.write_store();
            match store.metadata.get_mut(key_id) {
                Some(metadata) => {
                    metadata.last_used = Some(now);
                    metadata.usage_count = metadata.usage_count.saturating_add(1);
                    metadata.algorithm
                }
                None => {
                    debug!(
                        target: "crypto::keys",
                        key_id = %key_id,
                        "Usage recorded for unknown key"
                    );
                    return;
                }
            }
        };
        self.publish(self.event(key_id, EventKind::Used, algorithm, "Key used", None));
    }

    pub fn get_key(&self, key_id: &str) -> Option<KeyPair> {
        self.read_store().material.get(key_id).cloned()
    }

    pub fn get_public_key(&self, key_id: &str) -> Option<Vec<u8>> {
        self.read_store()
            .material
            .get(key_id)
            .map(|keys| keys.public_key().to_vec())
    }

    pub fn get_key_metadata(&self, key_id: &str) -> Option<KeyMetadata> {
        self.read_store().metadata.get(key_id).cloned()
    }

    /// All keys in generation order.
    pub fn list_keys(&self) -> Vec<KeyMetadata> {
        self.read_store().metadata.values().cloned().collect()
    }

    pub fn key_health_report(&self) -> KeyHealthReport {
        let now = self.clock.now();
        let horizon = chrono::Duration::from_std(self.config.expiring_soon_horizon)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let soon = now.checked_add_signed(horizon).unwrap_or(now);

        let mut report = KeyHealthReport::default();
        {
            let store = self.read_store();
            for metadata in store.metadata.values() {
                report.total += 1;
                if metadata.status != KeyStatus::Active {
                    continue;
                }
                report.active += 1;
                if metadata.quantum_safe {
                    report.quantum_safe += 1;
                } else {
                    report.quantum_vulnerable += 1;
                }
                if metadata.expires_at.map_or(false, |at| at > now && at <= soon) {
                    report.expiring_soon += 1;
                }
            }
        }
        report.need_rotation = self.check_key_rotation_needs().len();
        report
    }

    pub fn add_event_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&KeyLifecycleEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Overrides the policy for `algorithm`. Expiry of existing keys is not
    /// recomputed.
    pub fn set_rotation_policy(&self, algorithm: AlgorithmId, policy: RotationPolicy) {
        self.write_store().policies.insert(algorithm, policy);
    }

    pub fn rotation_policy(&self, algorithm: AlgorithmId) -> RotationPolicy {
        self.read_store()
            .policies
            .get(&algorithm)
            .copied()
            .unwrap_or_else(|| RotationPolicy::default_for(algorithm))
    }

    pub fn events(&self) -> Vec<KeyLifecycleEvent> {
        self.read_store().events.clone()
    }

    pub fn events_for(&self, key_id: &str) -> Vec<KeyLifecycleEvent> {
        self.read_store()
            .events
            .iter()
            .filter(|e| e.key_id == key_id || e.previous_key_id.as_deref() == Some(key_id))
            .cloned()
            .collect()
    }

    /// Seals the material of `key_id` under `password`.
    pub fn export_key_material(&self, key_id: &str, password: &str) -> Result<SealedKey> {
        let keys = self
            .get_key(key_id)
            .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))?;
        master_key::seal_key_pair(&keys, password, &self.config)
    }

    /// Opens `sealed` and stores it as a new active key.
    pub fn import_key_material(&self, sealed: &SealedKey, password: &str) -> Result<String> {
        let keys = master_key::open_key_pair(sealed, password, &self.config)?;
        Ok(self.insert_key(keys, "Key imported from sealed export"))
    }

    /// Metadata, events and policies (no key material), bincode-encoded.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let snapshot = {
            let store = self.read_store();
            KmsSnapshot {
                sequence: self.sequence.load(Ordering::SeqCst),
                keys: store.metadata.values().cloned().collect(),
                events: store.events.clone(),
                policies: store.policies.iter().map(|(a, p)| (*a, *p)).collect(),
            }
        };
        serialization::to_bytes(&snapshot).map_err(CryptoError::InvalidOperation)
    }

    /// Replaces metadata, events and policies with a snapshot. Material of
    /// keys still present is kept; everything else is dropped.
    pub fn restore_snapshot(&self, bytes: &[u8]) -> Result<()> {
        use tracing::info;

        let snapshot: KmsSnapshot =
            serialization::from_bytes(bytes).map_err(CryptoError::InvalidOperation)?;
        let restored = snapshot.keys.len();
        {
            let mut store = self.write_store();
            store.metadata = snapshot
                .keys
                .into_iter()
                .map(|metadata| (metadata.id.clone(), metadata))
                .collect();
            let KeyStore { metadata, material, .. } = &mut *store;
            let live = |id: &String| {
                metadata.get(id).map_or(false, |m| m.status != KeyStatus::Revoked)
            };
            material.retain(|id, _| live(id));
            self.key_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|id, _| live(id));
            store.events = snapshot.events;
            store.policies = snapshot.policies.into_iter().collect();
        }
        self.sequence.fetch_max(snapshot.sequence, Ordering::SeqCst);

        info!(target: "crypto::keys", keys = restored, "Key store restored from snapshot");
        Ok(())
    }
}
