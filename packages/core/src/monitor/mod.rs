//! Security monitor: threat scoring, algorithm recommendation, usage audits
//! and the per-key lifecycle log.
//!
//! Scoring is stateless; the monitor keeps only the audit history, the
//! per-key log and the published [`ThreatGauge`] snapshot.

pub mod audit;
pub mod threat;

use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::events::{KeyLifecycleEvent, ListenerId};
use crate::crypto::factory::ProviderFactory;
use crate::crypto::keys::KeyManagementService;
use crate::error::{CryptoError, Result};
use crate::utils::time::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

pub use audit::{AuditReport, MessageStats, MessageStatsSource, QuantumReadiness, ReadinessStatus};
pub use threat::{score_from_factors, ThreatFactors, ThreatGauge, ThreatModel, ThreatSnapshot};

/// Threat score at which quantum-vulnerable algorithms are refused.
pub const THREAT_GUARD_SCORE: u8 = 90;
/// Threat score above which readiness reports carry a warning line.
pub const HIGH_THREAT_SCORE: u8 = 75;

pub struct SecurityMonitor {
    model: ThreatModel,
    gauge: ThreatGauge,
    clock: Arc<dyn Clock>,
    stats: Arc<dyn MessageStatsSource>,
    /// Источник флага enableHybridMode
    factory: Arc<ProviderFactory>,
    history: Mutex<VecDeque<AuditReport>>,
    history_limit: usize,
    key_log: RwLock<HashMap<String, Vec<KeyLifecycleEvent>>>,
}

impl std::fmt::Debug for SecurityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityMonitor")
            .field("model", &self.model)
            .field("threat", &self.gauge.snapshot())
            .finish_non_exhaustive()
    }
}

impl SecurityMonitor {
    /// Threat model constants and the history limit come from the factory's
    /// engine config; hybrid mode is read from its live provider config.
    pub fn new(
        factory: Arc<ProviderFactory>,
        gauge: ThreatGauge,
        clock: Arc<dyn Clock>,
        stats: Arc<dyn MessageStatsSource>,
    ) -> Self {
        let config = factory.engine_config();
        Self {
            model: ThreatModel::from_config(config),
            gauge,
            clock,
            stats,
            history: Mutex::new(VecDeque::new()),
            history_limit: config.audit_history_limit.max(1),
            key_log: RwLock::new(HashMap::new()),
            factory,
        }
    }

    pub fn gauge(&self) -> &ThreatGauge {
        &self.gauge
    }

    pub fn threat_factors(&self) -> ThreatFactors {
        self.model.factors_at(self.clock.now())
    }

    /// Recomputes the score and publishes it to the shared gauge.
    pub fn assess_quantum_threat(&self) -> u8 {
        use tracing::info;

        let now = self.clock.now();
        let factors = self.model.factors_at(now);
        let score = score_from_factors(&factors);
        let previous = self.gauge.snapshot();

        self.gauge.publish(ThreatSnapshot {
            score,
            assessed_at: Some(now),
        });

        if previous.score != score || previous.assessed_at.is_none() {
            info!(
                target: "monitor",
                score,
                temporal = factors.temporal,
                technical = factors.technical,
                readiness = factors.readiness,
                regulatory = factors.regulatory,
                "Quantum threat assessed"
            );
        }
        score
    }

    /// Last published score, without recomputation.
    pub fn current_threat(&self) -> ThreatSnapshot {
        self.gauge.snapshot()
    }

    pub fn recommend_for_score(&self, score: u8) -> AlgorithmId {
        match score {
            90..=u8::MAX => AlgorithmId::MlKem1024,
            70..=89 => AlgorithmId::MlKem768,
            50..=69 => {
                if self.factory.config().enable_hybrid_mode {
                    AlgorithmId::HybridEcdhMlKem
                } else {
                    AlgorithmId::MlKem768
                }
            }
            25..=49 => AlgorithmId::MlKem512,
            _ => AlgorithmId::Ecdh,
        }
    }

    pub fn recommend_algorithm(&self) -> AlgorithmId {
        let score = self.assess_quantum_threat();
        self.recommend_for_score(score)
    }

    /// Refuses quantum-vulnerable algorithms once the published score reaches
    /// [`THREAT_GUARD_SCORE`].
    pub fn guard_algorithm(&self, algorithm: AlgorithmId) -> Result<()> {
        let score = self.gauge.score();
        if score >= THREAT_GUARD_SCORE && !algorithm.is_quantum_safe() {
            return Err(CryptoError::QuantumThreatDetected(format!(
                "{} is quantum-vulnerable and the threat score is {}",
                algorithm, score
            )));
        }
        Ok(())
    }

    pub fn audit_crypto_usage(&self) -> AuditReport {
        use tracing::info;

        let threat_score = self.assess_quantum_threat();
        let stats = self.stats.message_stats();

        let report = AuditReport {
            total_messages: stats.total(),
            quantum_vulnerable_messages: stats.quantum_vulnerable(),
            quantum_safe_messages: stats.quantum_safe(),
            hybrid_messages: stats.hybrid(),
            recommendations: audit::recommendations(&stats, threat_score),
            threat_score,
            assessed_at: self.clock.now(),
        };

        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push_back(report.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        info!(
            target: "monitor",
            total = report.total_messages,
            vulnerable = report.quantum_vulnerable_messages,
            threat_score,
            "Crypto usage audited"
        );
        report
    }

    /// Oldest first.
    pub fn audit_history(&self) -> Vec<AuditReport> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn system_quantum_readiness(&self) -> QuantumReadiness {
        let stats = self.stats.message_stats();
        let total = stats.total();
        let protected = stats.quantum_safe() + stats.hybrid();

        let score = if total == 0 {
            100
        } else {
            audit::percent(protected, total).round().clamp(0.0, 100.0) as u8
        };
        let status = ReadinessStatus::from_score(score);

        let mut details = vec![
            format!("{} of {} messages use quantum-safe or hybrid encryption", protected, total),
            format!("{} messages remain quantum-vulnerable", stats.quantum_vulnerable()),
        ];

        let threat = self.assess_quantum_threat();
        if threat >= HIGH_THREAT_SCORE {
            details.push(format!(
                "Warning: quantum threat score is {}; accelerate migration of remaining keys",
                threat
            ));
        }

        QuantumReadiness {
            score,
            status,
            details,
        }
    }

    pub fn record_key_event(&self, event: &KeyLifecycleEvent) {
        let mut log = self.key_log.write().unwrap_or_else(PoisonError::into_inner);
        log.entry(event.key_id.clone()).or_default().push(event.clone());
        if let Some(previous) = &event.previous_key_id {
            log.entry(previous.clone()).or_default().push(event.clone());
        }
    }

    /// Events recorded for `key_id`; empty for unknown ids.
    pub fn track_key_lifecycle(&self, key_id: &str) -> Vec<KeyLifecycleEvent> {
        self.key_log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Subscribes the per-key log to `kms` lifecycle events. The listener
    /// holds only a weak reference to the monitor.
    pub fn attach(self: &Arc<Self>, kms: &KeyManagementService) -> ListenerId {
        let monitor: Weak<SecurityMonitor> = Arc::downgrade(self);
        kms.add_event_listener(move |event| {
            if let Some(monitor) = monitor.upgrade() {
                monitor.record_key_event(event);
            }
        })
    }
}
