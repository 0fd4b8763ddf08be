//! End-to-end tests for the agility engine
//!
//! This test suite covers:
//! - Provider factory fallback chain and cache
//! - Key lifecycle: rotation, revocation, batch rotation, health report
//! - Threat scoring and algorithm recommendation
//! - Messaging through the in-memory directory and sink

use chrono::{TimeZone, Utc};
use construct_agility_core::crypto::events::EventKind;
use construct_agility_core::crypto::policy::RotationPolicy;
use construct_agility_core::monitor::{MessageStats, ReadinessStatus, ThreatModel};
use construct_agility_core::protocol::MessageKind;
use construct_agility_core::storage::{MemoryDirectory, MemorySink};
use construct_agility_core::utils::logging;
use construct_agility_core::utils::time::{Clock, ManualClock};
use construct_agility_core::{
    AgilityConfig, AlgorithmId, CryptoError, ErrorKind, KeyManagementService, KeyStatus, Provider,
    ProviderConfig, ProviderConfigPatch, ProviderFactory, SecureMessenger, SecurityMonitor,
    ThreatGauge,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn clock_at(year: i32) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()))
}

fn kms_with(factory: Arc<ProviderFactory>, clock: Arc<ManualClock>) -> KeyManagementService {
    KeyManagementService::new(factory, ThreatGauge::new(), clock)
}

fn default_factory() -> Arc<ProviderFactory> {
    Arc::new(ProviderFactory::new(ProviderConfig::default(), AgilityConfig::default()))
}

/// Factory whose instantiator records every attempt and fails for the
/// algorithms in the shared set
fn recording_factory(
    config: ProviderConfig,
) -> (Arc<ProviderFactory>, Arc<Mutex<Vec<AlgorithmId>>>, Arc<Mutex<HashSet<AlgorithmId>>>) {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let failing = Arc::new(Mutex::new(HashSet::new()));

    let recorded = Arc::clone(&attempts);
    let broken = Arc::clone(&failing);
    let factory = ProviderFactory::with_instantiator(
        config,
        AgilityConfig::default(),
        move |algorithm, engine| {
            recorded.lock().unwrap().push(algorithm);
            if broken.lock().unwrap().contains(&algorithm) {
                let reason = format!("{} disabled in test", algorithm);
                return Err(CryptoError::AlgorithmNotSupported(reason));
            }
            Provider::new(algorithm, engine)
        },
    );
    (Arc::new(factory), attempts, failing)
}

fn monitor_for(factory: Arc<ProviderFactory>, clock: Arc<ManualClock>) -> SecurityMonitor {
    SecurityMonitor::new(factory, ThreatGauge::new(), clock, Arc::new(MessageStats::default))
}

// ============================================
// PROVIDER FACTORY
// ============================================

/// Fallbacks are tried in configured order, the first success wins
#[test]
fn test_fallback_chain_order() {
    let config = ProviderConfig {
        preferred_algorithm: AlgorithmId::MlKem1024,
        fallback_algorithms: vec![AlgorithmId::MlKem768, AlgorithmId::Ecdh],
        ..ProviderConfig::default()
    };
    let (factory, attempts, failing) = recording_factory(config);
    failing.lock().unwrap().extend([AlgorithmId::MlKem1024, AlgorithmId::MlKem768]);

    let provider = factory.create_provider(None).unwrap();
    assert_eq!(provider.algorithm(), AlgorithmId::Ecdh);
    assert_eq!(
        *attempts.lock().unwrap(),
        vec![AlgorithmId::MlKem1024, AlgorithmId::MlKem768, AlgorithmId::Ecdh]
    );
}

/// Exhausted chain reports AlgorithmNotSupported
#[test]
fn test_fallback_chain_exhausted() {
    let config = ProviderConfig {
        preferred_algorithm: AlgorithmId::MlKem1024,
        fallback_algorithms: vec![AlgorithmId::Ecdh],
        ..ProviderConfig::default()
    };
    let (factory, _, failing) = recording_factory(config);
    failing.lock().unwrap().extend([AlgorithmId::MlKem1024, AlgorithmId::Ecdh]);

    let err = factory.create_provider(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlgorithmNotSupported);
}

/// Providers are cached until the config changes
#[test]
fn test_provider_cache_and_config_update() {
    let (factory, attempts, _) = recording_factory(ProviderConfig::default());

    let first = factory.provider_for(AlgorithmId::MlKem768).unwrap();
    let second = factory.provider_for(AlgorithmId::MlKem768).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.lock().unwrap().len(), 1);

    factory
        .update_config(ProviderConfigPatch {
            preferred_algorithm: Some(AlgorithmId::MlKem1024),
            ..ProviderConfigPatch::default()
        })
        .unwrap();
    assert!(factory.cached_algorithms().is_empty());
    assert_eq!(factory.config().preferred_algorithm, AlgorithmId::MlKem1024);

    let third = factory.provider_for(AlgorithmId::MlKem768).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

/// An invalid patch leaves the previous config in place
#[test]
fn test_invalid_config_update_is_rejected() {
    let factory = default_factory();
    let before = factory.config();
    let result = factory.update_config(ProviderConfigPatch {
        quantum_threshold_score: Some(101),
        ..ProviderConfigPatch::default()
    });
    assert!(result.is_err());
    assert_eq!(factory.config(), before);
}

/// Migration from a vulnerable algorithm carries the re-encryption warning
#[test]
fn test_migration_plan() {
    let factory = default_factory();
    let migration = factory
        .migrate_from_algorithm(AlgorithmId::Ecdh, AlgorithmId::HybridEcdhMlKem)
        .unwrap();
    assert!(migration.plan.requires_reencryption);
    assert!(migration.plan.steps.last().unwrap().starts_with("WARNING"));
    assert_eq!(migration.new_provider.algorithm(), AlgorithmId::HybridEcdhMlKem);

    let migration = factory
        .migrate_from_algorithm(AlgorithmId::MlKem512, AlgorithmId::MlKem1024)
        .unwrap();
    assert!(!migration.plan.requires_reencryption);
}

// ============================================
// KEY LIFECYCLE
// ============================================

/// Rotation keeps the old material and links the events
#[test]
fn test_rotation_links_old_and_new_key() {
    let kms = kms_with(default_factory(), clock_at(2026));
    let old_id = kms.generate_key(AlgorithmId::MlKem768).unwrap();
    let new_id = kms.rotate_key(&old_id).unwrap();

    assert_ne!(old_id, new_id);
    assert_eq!(kms.get_key_metadata(&old_id).unwrap().status, KeyStatus::Rotating);
    assert_eq!(kms.get_key_metadata(&new_id).unwrap().status, KeyStatus::Active);
    assert_eq!(
        kms.get_key_metadata(&new_id).unwrap().algorithm,
        AlgorithmId::MlKem768
    );
    assert!(kms.get_key(&old_id).is_some(), "old material stays until revocation");

    let rotated: Vec<_> = kms
        .events_for(&old_id)
        .into_iter()
        .filter(|e| e.kind == EventKind::Rotated)
        .collect();
    assert_eq!(rotated.len(), 1);
    assert_eq!(rotated[0].key_id, new_id);
    assert_eq!(rotated[0].previous_key_id.as_deref(), Some(old_id.as_str()));

    let err = kms.rotate_key(&old_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

/// Revocation erases material and is final
#[test]
fn test_revocation_is_final() {
    let kms = kms_with(default_factory(), clock_at(2026));
    let id = kms.generate_key(AlgorithmId::Ecdh).unwrap();

    kms.revoke_key(&id).unwrap();
    assert_eq!(kms.get_key_metadata(&id).unwrap().status, KeyStatus::Revoked);
    assert!(kms.get_key(&id).is_none());
    assert!(kms.get_public_key(&id).is_none());

    assert_eq!(kms.revoke_key(&id).unwrap_err().kind(), ErrorKind::InvalidOperation);
    assert_eq!(kms.rotate_key(&id).unwrap_err().kind(), ErrorKind::InvalidOperation);
    assert_eq!(kms.rotate_key("missing").unwrap_err().kind(), ErrorKind::KeyNotFound);
}

/// A panicking listener does not break the operation or the other listeners
#[test]
fn test_kms_listeners_add_remove_and_panics() {
    let kms = kms_with(default_factory(), clock_at(2026));
    let seen = Arc::new(AtomicUsize::new(0));

    kms.add_event_listener(|_| panic!("listener failure"));
    let counter = Arc::clone(&seen);
    let counting = kms.add_event_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let id = kms.generate_key(AlgorithmId::Ecdh).unwrap();
    kms.record_key_usage(&id);
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    assert!(kms.remove_event_listener(counting));
    assert!(!kms.remove_event_listener(counting));

    kms.revoke_key(&id).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(kms.get_key_metadata(&id).unwrap().status, KeyStatus::Revoked);
    assert_eq!(kms.events_for(&id).len(), 3);
}

/// One failing key does not stop the rest of the sweep
#[test]
fn test_batch_rotation_partial_failure() {
    let (factory, _, failing) = recording_factory(ProviderConfig::default());
    let clock = clock_at(2026);
    let kms = kms_with(factory.clone(), clock.clone());

    let ecdh = kms.generate_key(AlgorithmId::Ecdh).unwrap();
    let small = kms.generate_key(AlgorithmId::MlKem512).unwrap();
    let medium = kms.generate_key(AlgorithmId::MlKem768).unwrap();

    failing.lock().unwrap().insert(AlgorithmId::MlKem512);
    factory.invalidate_cache();

    // Все три политики истекают
    clock.advance(chrono::Duration::days(3 * 365 + 1));
    assert_eq!(kms.check_key_rotation_needs(), vec![ecdh.clone(), small.clone(), medium.clone()]);

    let report = kms.perform_scheduled_rotations();
    let rotated: Vec<_> = report.rotated.iter().map(|r| r.old_key_id.clone()).collect();
    assert_eq!(rotated, vec![ecdh, medium]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key_id, small);
    assert_eq!(kms.get_key_metadata(&small).unwrap().status, KeyStatus::Active);
}

/// A rotation that hangs past the timeout is reported and the sweep moves on
#[tokio::test]
async fn test_timed_sweep_survives_hung_rotation() {
    let slow = Arc::new(Mutex::new(HashSet::new()));
    let stalled = Arc::clone(&slow);
    let factory = Arc::new(ProviderFactory::with_instantiator(
        ProviderConfig::default(),
        AgilityConfig::default(),
        move |algorithm, engine| {
            if stalled.lock().unwrap().contains(&algorithm) {
                std::thread::sleep(Duration::from_millis(1_500));
            }
            Provider::new(algorithm, engine)
        },
    ));
    let clock = clock_at(2026);
    let kms = Arc::new(kms_with(Arc::clone(&factory), clock.clone()));

    let ecdh = kms.generate_key(AlgorithmId::Ecdh).unwrap();
    let small = kms.generate_key(AlgorithmId::MlKem512).unwrap();
    let medium = kms.generate_key(AlgorithmId::MlKem768).unwrap();

    slow.lock().unwrap().insert(AlgorithmId::MlKem512);
    factory.invalidate_cache();
    clock.advance(chrono::Duration::days(3 * 365 + 1));

    let report = kms
        .perform_scheduled_rotations_with_timeout(Duration::from_millis(300))
        .await;

    let rotated: Vec<_> = report.rotated.iter().map(|r| r.old_key_id.clone()).collect();
    assert_eq!(rotated, vec![ecdh, medium]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key_id, small);
    assert_eq!(report.failed[0].error.kind(), ErrorKind::KeyGenerationFailed);
}

/// Keys expiring within the next 7 days, boundary included, count as expiring soon
#[test]
fn test_expiring_soon_window() {
    let clock = clock_at(2026);
    let kms = kms_with(default_factory(), clock.clone());

    // ECDH живёт 90 дней: истекают на 90, 91 и 92 день
    let first = kms.generate_key(AlgorithmId::Ecdh).unwrap();
    clock.advance(chrono::Duration::days(1));
    kms.generate_key(AlgorithmId::Ecdh).unwrap();
    clock.advance(chrono::Duration::days(1));
    kms.generate_key(AlgorithmId::Ecdh).unwrap();

    // День 84: +6, +7 (граница) и +8 дней до истечения
    clock.advance(chrono::Duration::days(82));
    let report = kms.key_health_report();
    assert_eq!(report.expiring_soon, 2);
    assert_eq!(report.need_rotation, 0);

    // День 90: первый ключ истёк и больше не "скоро истекает"
    clock.advance(chrono::Duration::days(6));
    let report = kms.key_health_report();
    assert_eq!(report.expiring_soon, 2);
    assert_eq!(report.need_rotation, 1);
    assert_eq!(kms.check_key_rotation_needs(), vec![first]);
}

/// Manual policies expire keys instead of rotating them
#[test]
fn test_manual_policy_expires() {
    let clock = clock_at(2026);
    let kms = kms_with(default_factory(), clock.clone());
    kms.set_rotation_policy(AlgorithmId::Ecdh, RotationPolicy::new(1, 10, 50).manual());
    let id = kms.generate_key(AlgorithmId::Ecdh).unwrap();

    clock.advance(chrono::Duration::days(2));
    let report = kms.perform_scheduled_rotations();
    assert!(report.rotated.is_empty());
    assert_eq!(report.expired, vec![id.clone()]);
    assert_eq!(kms.get_key_metadata(&id).unwrap().status, KeyStatus::Expired);
}

/// Usage budget triggers rotation
#[test]
fn test_usage_count_triggers_rotation() {
    let kms = kms_with(default_factory(), clock_at(2026));
    kms.set_rotation_policy(AlgorithmId::MlKem512, RotationPolicy::new(365, 2, 95));
    let id = kms.generate_key(AlgorithmId::MlKem512).unwrap();

    kms.record_key_usage(&id);
    assert!(kms.check_key_rotation_needs().is_empty());
    kms.record_key_usage(&id);
    assert_eq!(kms.check_key_rotation_needs(), vec![id.clone()]);
    assert!(kms.get_key_metadata(&id).unwrap().last_used.is_some());
}

/// High threat flags quantum-vulnerable keys only
#[test]
fn test_threat_flags_vulnerable_keys() {
    let factory = default_factory();
    let gauge = ThreatGauge::with_score(60);
    let kms = KeyManagementService::new(factory, gauge, clock_at(2026));

    let vulnerable = kms.generate_key(AlgorithmId::Ecdh).unwrap();
    let _safe = kms.generate_key(AlgorithmId::MlKem768).unwrap();
    assert_eq!(kms.check_key_rotation_needs(), vec![vulnerable]);
}

/// Health report counts safety over active keys only
#[test]
fn test_key_health_report() {
    let kms = kms_with(default_factory(), clock_at(2026));
    kms.generate_key(AlgorithmId::MlKem512).unwrap();
    kms.generate_key(AlgorithmId::MlKem768).unwrap();
    kms.generate_key(AlgorithmId::HybridEcdhMlKem).unwrap();
    kms.generate_key(AlgorithmId::Ecdh).unwrap();
    kms.generate_key(AlgorithmId::Ecdh).unwrap();
    let revoked = kms.generate_key(AlgorithmId::Ecdh).unwrap();
    kms.revoke_key(&revoked).unwrap();

    let report = kms.key_health_report();
    assert_eq!(report.total, 6);
    assert_eq!(report.active, 5);
    assert_eq!(report.quantum_safe, 3);
    assert_eq!(report.quantum_vulnerable, 2);
    assert_eq!(report.expiring_soon, 0);
    assert_eq!(report.need_rotation, 0);
}

/// Sealed export opens only with the right password
#[test]
fn test_export_import_key_material() {
    let engine = AgilityConfig {
        pbkdf2_iterations: 1_000,
        ..AgilityConfig::default()
    };
    let factory = Arc::new(ProviderFactory::new(ProviderConfig::default(), engine));
    let kms = kms_with(factory, clock_at(2026));
    let id = kms.generate_key(AlgorithmId::Ecdh).unwrap();

    let sealed = kms.export_key_material(&id, "correct horse battery 42").unwrap();
    assert_eq!(
        kms.import_key_material(&sealed, "wrong password 7").unwrap_err().kind(),
        ErrorKind::DecryptionFailed
    );

    let imported = kms.import_key_material(&sealed, "correct horse battery 42").unwrap();
    assert_ne!(imported, id);
    assert_eq!(kms.get_public_key(&imported), kms.get_public_key(&id));
}

// ============================================
// THREAT MONITOR
// ============================================

/// The score never decreases as time moves forward
#[test]
fn test_threat_score_is_monotonic() {
    let model = ThreatModel::from_config(&AgilityConfig::default());
    let mut previous = 0;
    for year in 2015..=2045 {
        let score = model.assess(Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap());
        assert!(score >= previous, "score dropped in {}", year);
        assert!(score <= 100);
        previous = score;
    }
    assert_eq!(previous, 100);
}

/// Recommendation thresholds
#[test]
fn test_recommendation_by_score() {
    let monitor = monitor_for(default_factory(), clock_at(2026));

    assert_eq!(monitor.recommend_for_score(95), AlgorithmId::MlKem1024);
    assert_eq!(monitor.recommend_for_score(80), AlgorithmId::MlKem768);
    assert_eq!(monitor.recommend_for_score(60), AlgorithmId::HybridEcdhMlKem);
    assert_eq!(monitor.recommend_for_score(30), AlgorithmId::MlKem512);
    assert_eq!(monitor.recommend_for_score(10), AlgorithmId::Ecdh);
}

/// Disabling hybrid mode on the factory changes both recommendation paths
#[test]
fn test_hybrid_mode_switch_reaches_monitor() {
    let factory = default_factory();
    let monitor = monitor_for(Arc::clone(&factory), clock_at(2026));

    factory
        .update_config(ProviderConfigPatch {
            enable_hybrid_mode: Some(false),
            ..ProviderConfigPatch::default()
        })
        .unwrap();
    assert_eq!(monitor.recommend_for_score(60), AlgorithmId::MlKem768);
    assert_eq!(factory.recommended_algorithm(60), AlgorithmId::MlKem768);
}

/// With a threshold above 90 the factory stays hybrid below it
#[test]
fn test_factory_threshold_above_ninety() {
    let config = ProviderConfig {
        quantum_threshold_score: 95,
        ..ProviderConfig::default()
    };
    let factory = ProviderFactory::new(config, AgilityConfig::default());
    assert_eq!(factory.recommended_algorithm(92), AlgorithmId::HybridEcdhMlKem);
    assert_eq!(factory.recommended_algorithm(96), AlgorithmId::MlKem1024);
}

/// The monitor's key log follows rotations across ids
#[test]
fn test_monitor_tracks_key_lifecycle() {
    let clock = clock_at(2026);
    let factory = default_factory();
    let kms = kms_with(Arc::clone(&factory), clock.clone());
    let monitor = Arc::new(monitor_for(factory, clock));
    monitor.attach(&kms);

    let old_id = kms.generate_key(AlgorithmId::MlKem512).unwrap();
    let new_id = kms.rotate_key(&old_id).unwrap();

    let kinds: Vec<_> = monitor.track_key_lifecycle(&old_id).iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Created, EventKind::Rotated]);
    assert_eq!(monitor.track_key_lifecycle(&new_id).len(), 1);
    assert!(monitor.track_key_lifecycle("unknown").is_empty());
}

// ============================================
// MESSAGING
// ============================================

struct Network {
    directory: Arc<MemoryDirectory>,
    sink: Arc<MemorySink>,
    clock: Arc<ManualClock>,
}

impl Network {
    fn new(year: i32) -> Self {
        logging::init_logging();
        Self {
            directory: Arc::new(MemoryDirectory::new()),
            sink: Arc::new(MemorySink::new()),
            clock: clock_at(year),
        }
    }

    fn messenger(&self, user_id: &str) -> SecureMessenger {
        let factory = default_factory();
        let kms = Arc::new(kms_with(Arc::clone(&factory), Arc::clone(&self.clock)));
        SecureMessenger::new(
            user_id,
            factory,
            kms,
            self.directory.clone(),
            self.sink.clone(),
            self.clock.clone(),
        )
    }

    fn join(&self, messenger: &SecureMessenger, algorithm: AlgorithmId) {
        let exported = messenger.create_identity(Some(algorithm)).unwrap();
        self.directory.publish(messenger.user_id(), exported);
    }
}

/// Alice encrypts under Bob's published algorithm, Bob decrypts
#[tokio::test]
async fn test_send_and_receive() -> anyhow::Result<()> {
    let network = Network::new(2026);
    let alice = network.messenger("alice");
    let bob = network.messenger("bob");
    network.join(&bob, AlgorithmId::HybridEcdhMlKem);

    let sent = alice.send_message("bob", b"hi bob", MessageKind::Text).await?;
    assert_eq!(sent.algorithm, AlgorithmId::HybridEcdhMlKem);
    assert_eq!(sent.timestamp, network.clock.now().timestamp());

    let inbox = network.sink.inbox("bob")?;
    assert_eq!(inbox, vec![sent.clone()]);
    assert_eq!(bob.receive_message(&inbox[0])?, b"hi bob");

    // Чужой конверт не расшифровывается
    assert_eq!(
        alice.receive_message(&inbox[0]).unwrap_err().kind(),
        ErrorKind::InvalidOperation
    );
    Ok(())
}

/// Messages sent before an identity rotation stay readable
#[tokio::test]
async fn test_receive_after_identity_rotation() {
    let network = Network::new(2026);
    let alice = network.messenger("alice");
    let bob = network.messenger("bob");
    network.join(&bob, AlgorithmId::MlKem768);

    let before = alice.send_message("bob", b"before", MessageKind::Text).await.unwrap();
    let exported = bob.rotate_identity().unwrap();
    network.directory.publish("bob", exported);
    let after = alice.send_message("bob", b"after", MessageKind::Text).await.unwrap();

    assert_ne!(before.key_id, after.key_id);
    assert_eq!(bob.receive_message(&before).unwrap(), b"before");
    assert_eq!(bob.receive_message(&after).unwrap(), b"after");
}

/// Unknown recipients fail with KeyNotFound and nothing is delivered
#[tokio::test]
async fn test_send_to_unknown_recipient() {
    let network = Network::new(2026);
    let alice = network.messenger("alice");

    let err = alice.send_message("nobody", b"hello?", MessageKind::Text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    assert!(network.sink.is_empty());
}

/// Under a high threat score vulnerable recipients are refused
#[tokio::test]
async fn test_guard_refuses_vulnerable_recipient() {
    let network = Network::new(2040);
    let carol = network.messenger("carol");
    let dave = network.messenger("dave");
    network.join(&carol, AlgorithmId::Ecdh);
    network.join(&dave, AlgorithmId::MlKem1024);

    let monitor = Arc::new(SecurityMonitor::new(
        default_factory(),
        ThreatGauge::new(),
        network.clock.clone(),
        network.sink.clone(),
    ));
    assert_eq!(monitor.assess_quantum_threat(), 100);

    let alice = network.messenger("alice").with_monitor(Arc::clone(&monitor));
    let err = alice.send_message("carol", b"x", MessageKind::Text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuantumThreatDetected);

    alice.send_message("dave", b"y", MessageKind::Text).await.unwrap();
    assert_eq!(network.sink.len(), 1);
}

/// Audit and readiness are computed from delivered traffic
#[tokio::test]
async fn test_audit_over_delivered_messages() {
    let network = Network::new(2026);
    let alice = network.messenger("alice");
    let bob = network.messenger("bob");
    let carol = network.messenger("carol");
    network.join(&bob, AlgorithmId::Ecdh);
    network.join(&carol, AlgorithmId::MlKem768);

    for _ in 0..3 {
        alice.send_message("bob", b"legacy", MessageKind::Text).await.unwrap();
    }
    alice.send_message("carol", b"modern", MessageKind::Text).await.unwrap();

    let monitor = SecurityMonitor::new(
        default_factory(),
        ThreatGauge::new(),
        network.clock.clone(),
        network.sink.clone(),
    );
    let report = monitor.audit_crypto_usage();
    assert_eq!(report.total_messages, 4);
    assert_eq!(report.quantum_vulnerable_messages, 3);
    assert!(report.recommendations[0].starts_with("HIGH"));
    assert_eq!(monitor.audit_history().len(), 1);

    let readiness = monitor.system_quantum_readiness();
    assert_eq!(readiness.score, 25);
    assert_eq!(readiness.status, ReadinessStatus::Critical);
}
