use crate::crypto::algorithm::{AlgorithmId, SecurityLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Message counts per encryption algorithm, as reported by the message store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub by_algorithm: BTreeMap<AlgorithmId, u64>,
}

impl MessageStats {
    pub fn record(&mut self, algorithm: AlgorithmId, count: u64) {
        *self.by_algorithm.entry(algorithm).or_default() += count;
    }

    pub fn total(&self) -> u64 {
        self.by_algorithm.values().sum()
    }

    fn count_where(&self, pred: impl Fn(AlgorithmId) -> bool) -> u64 {
        self.by_algorithm
            .iter()
            .filter(|(alg, _)| pred(**alg))
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn quantum_vulnerable(&self) -> u64 {
        self.count_where(|alg| alg.security_level() == SecurityLevel::QuantumVulnerable)
    }

    pub fn hybrid(&self) -> u64 {
        self.count_where(|alg| alg.security_level() == SecurityLevel::Hybrid)
    }

    /// Pure post-quantum (resistant or safe), hybrids excluded.
    pub fn quantum_safe(&self) -> u64 {
        self.count_where(|alg| {
            matches!(
                alg.security_level(),
                SecurityLevel::QuantumSafe | SecurityLevel::QuantumResistant
            )
        })
    }
}

/// Count callback supplied by the external message store.
pub trait MessageStatsSource: Send + Sync {
    fn message_stats(&self) -> MessageStats;
}

impl<F> MessageStatsSource for F
where
    F: Fn() -> MessageStats + Send + Sync,
{
    fn message_stats(&self) -> MessageStats {
        self()
    }
}

/// Immutable point-in-time audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub total_messages: u64,
    pub quantum_vulnerable_messages: u64,
    pub quantum_safe_messages: u64,
    pub hybrid_messages: u64,
    pub recommendations: Vec<String>,
    pub threat_score: u8,
    pub assessed_at: DateTime<Utc>,
}

impl AuditReport {
    pub fn vulnerable_percent(&self) -> f64 {
        percent(self.quantum_vulnerable_messages, self.total_messages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl ReadinessStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => ReadinessStatus::Excellent,
            70..=89 => ReadinessStatus::Good,
            50..=69 => ReadinessStatus::Warning,
            _ => ReadinessStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantumReadiness {
    pub score: u8,
    pub status: ReadinessStatus,
    pub details: Vec<String>,
}

pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Tiered guidance by the share of quantum-vulnerable traffic.
pub(crate) fn recommendations(stats: &MessageStats, threat_score: u8) -> Vec<String> {
    let total = stats.total();
    let mut out = Vec::new();

    if total == 0 {
        out.push(
            "No encrypted messages recorded yet; new conversations will use the \
             recommended algorithm"
                .to_string(),
        );
    } else {
        let vulnerable = percent(stats.quantum_vulnerable(), total);
        let line = if vulnerable > 80.0 {
            format!(
                "URGENT: {:.1}% of messages use quantum-vulnerable encryption; migrate to \
                 hybrid or post-quantum keys and re-encrypt stored history",
                vulnerable
            )
        } else if vulnerable > 60.0 {
            format!(
                "HIGH: {:.1}% of messages are quantum-vulnerable; enable hybrid mode for \
                 all active conversations",
                vulnerable
            )
        } else if vulnerable >= 40.0 {
            format!(
                "MODERATE: {:.1}% of messages are quantum-vulnerable; continue the \
                 migration to post-quantum algorithms",
                vulnerable
            )
        } else {
            "Excellent post-quantum adoption; keep monitoring the threat landscape".to_string()
        };
        out.push(line);

        if stats.hybrid() > 0 && stats.quantum_safe() == 0 {
            out.push(
                "Hybrid encryption is in use; plan the move to pure post-quantum keys".to_string(),
            );
        }
    }

    if threat_score >= 75 {
        out.push(format!(
            "Threat score {} is high: use ML-KEM-1024 for new long-lived keys",
            threat_score
        ));
    }
    out
}
