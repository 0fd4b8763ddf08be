use crate::crypto::algorithm::{AlgorithmFamily, AlgorithmId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const DAY: u64 = 24 * 60 * 60;

/// Правила ротации для одного алгоритма
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationPolicy {
    pub max_age: Duration,
    pub max_usage_count: u64,
    pub auto_rotate: bool,
    /// Non-quantum-safe keys are flagged once the threat score reaches this value
    pub quantum_threat_threshold: u8,
}

impl RotationPolicy {
    pub fn new(max_age_days: u64, max_usage_count: u64, quantum_threat_threshold: u8) -> Self {
        Self {
            max_age: Duration::from_secs(max_age_days * DAY),
            max_usage_count,
            auto_rotate: true,
            quantum_threat_threshold,
        }
    }

    pub fn manual(mut self) -> Self {
        self.auto_rotate = false;
        self
    }

    /// Default policy for `algorithm`.
    pub fn default_for(algorithm: AlgorithmId) -> Self {
        match (algorithm.family(), algorithm) {
            (AlgorithmFamily::Classical, _) => Self::new(90, 10_000, 50),
            (AlgorithmFamily::Hybrid, _) => Self::new(180, 50_000, 70),
            (AlgorithmFamily::PostQuantum, AlgorithmId::MlKem512) => Self::new(365, 100_000, 95),
            (AlgorithmFamily::PostQuantum, _) => Self::new(730, 500_000, 98),
        }
    }
}

/// Canonical starting table, one entry per algorithm.
pub fn default_policies() -> BTreeMap<AlgorithmId, RotationPolicy> {
    AlgorithmId::ALL
        .iter()
        .map(|alg| (*alg, RotationPolicy::default_for(*alg)))
        .collect()
}
