//! Quantum threat model and the shared threat snapshot.
//!
//! Score = 0.4·temporal + 0.3·technical + 0.2·readiness + 0.1·regulatory,
//! every factor clamped to [0, 100], result clamped and rounded.

use crate::config::AgilityConfig;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

const TEMPORAL_WEIGHT: f64 = 0.4;
const TECHNICAL_WEIGHT: f64 = 0.3;
const READINESS_WEIGHT: f64 = 0.2;
const REGULATORY_WEIGHT: f64 = 0.1;

/// FIPS 203/204/205 publication, 2024-08-13T00:00:00Z
const STANDARDIZATION_TIMESTAMP: i64 = 1_723_507_200;
const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;

const TECHNICAL_BASE_YEAR: f64 = 2019.0;
const TECHNICAL_BASE: f64 = 20.0;
const TECHNICAL_PER_YEAR: f64 = 7.0;
const READINESS_PER_YEAR: f64 = 15.0;
const REGULATORY_PER_YEAR: f64 = 10.0;

/// Individual factors, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatFactors {
    pub temporal: f64,
    pub technical: f64,
    pub readiness: f64,
    pub regulatory: f64,
}

fn clamp_factor(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Weighted sum, clamped to [0, 100] and rounded.
pub fn score_from_factors(factors: &ThreatFactors) -> u8 {
    let weighted = TEMPORAL_WEIGHT * clamp_factor(factors.temporal)
        + TECHNICAL_WEIGHT * clamp_factor(factors.technical)
        + READINESS_WEIGHT * clamp_factor(factors.readiness)
        + REGULATORY_WEIGHT * clamp_factor(factors.regulatory);
    weighted.clamp(0.0, 100.0).round() as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreatModel {
    pub quantum_capability_year: f64,
    pub horizon_years: f64,
    pub regulatory_deadline_year: f64,
}

impl ThreatModel {
    pub fn from_config(config: &AgilityConfig) -> Self {
        Self {
            quantum_capability_year: config.quantum_capability_year,
            horizon_years: config.threat_horizon_years,
            regulatory_deadline_year: config.regulatory_deadline_year,
        }
    }

    pub fn factors_at(&self, now: DateTime<Utc>) -> ThreatFactors {
        let year = fractional_year(now);

        let ramp_start = self.quantum_capability_year - self.horizon_years;
        let temporal = if self.horizon_years > 0.0 {
            (year - ramp_start) / self.horizon_years * 100.0
        } else {
            100.0
        };

        let technical = TECHNICAL_BASE + TECHNICAL_PER_YEAR * (year - TECHNICAL_BASE_YEAR);

        let since_standardization =
            (now.timestamp() - STANDARDIZATION_TIMESTAMP) as f64 / SECONDS_PER_YEAR;
        let readiness = READINESS_PER_YEAR * since_standardization;

        let regulatory = 100.0 - REGULATORY_PER_YEAR * (self.regulatory_deadline_year - year);

        ThreatFactors {
            temporal: clamp_factor(temporal),
            technical: clamp_factor(technical),
            readiness: clamp_factor(readiness),
            regulatory: clamp_factor(regulatory),
        }
    }

    pub fn assess(&self, now: DateTime<Utc>) -> u8 {
        score_from_factors(&self.factors_at(now))
    }
}

fn fractional_year(at: DateTime<Utc>) -> f64 {
    at.year() as f64 + at.ordinal0() as f64 / 365.25
}

/// Last published assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatSnapshot {
    pub score: u8,
    pub assessed_at: Option<DateTime<Utc>>,
}

/// Shared, lock-protected threat snapshot. Writers publish whole snapshots,
/// so readers never observe a half-updated assessment.
#[derive(Debug, Clone, Default)]
pub struct ThreatGauge {
    inner: Arc<RwLock<ThreatSnapshot>>,
}

impl ThreatGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(score: u8) -> Self {
        let gauge = Self::new();
        gauge.publish(ThreatSnapshot {
            score,
            assessed_at: None,
        });
        gauge
    }

    pub fn publish(&self, snapshot: ThreatSnapshot) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn snapshot(&self) -> ThreatSnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn score(&self) -> u8 {
        self.snapshot().score
    }
}
