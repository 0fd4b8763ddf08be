//! Централизованная конфигурация для Construct Agility Core
//!
//! Все константы и настройки движка должны быть определены здесь,
//! чтобы избежать хардкода по всему проекту. Глобального синглтона нет:
//! конфигурация передаётся явно в конструкторы компонентов.

use crate::crypto::algorithm::AlgorithmId;
use crate::error::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Настройки движка (не относящиеся к выбору алгоритма)
#[derive(Debug, Clone)]
pub struct AgilityConfig {
    // ============================================
    // КРИПТОГРАФИЧЕСКИЕ ПАРАМЕТРЫ
    // ============================================

    /// Размер модуля RSA-OAEP по умолчанию (в битах)
    pub rsa_modulus_bits: usize,

    /// Размер модуля "усиленного" RSA-OAEP (в битах)
    pub rsa_strong_modulus_bits: usize,

    /// PBKDF2: количество итераций для запечатывания экспортируемых ключей
    pub pbkdf2_iterations: u32,

    /// Минимальная длина пароля для экспорта ключей
    pub password_min_length: usize,

    // ============================================
    // ЖИЗНЕННЫЙ ЦИКЛ КЛЮЧЕЙ
    // ============================================

    /// Горизонт "скоро истекает" для отчёта о здоровье ключей
    pub expiring_soon_horizon: Duration,

    /// Таймаут на ротацию одного ключа в фоновой задаче
    pub rotation_timeout: Duration,

    // ============================================
    // МОНИТОРИНГ
    // ============================================

    /// Период переоценки квантовой угрозы
    pub threat_assessment_interval: Duration,

    /// Максимальное количество отчётов аудита в истории
    pub audit_history_limit: usize,

    /// Оценочный год появления криптографически значимого квантового компьютера
    pub quantum_capability_year: f64,

    /// Длина линейной шкалы временной угрозы (в годах)
    pub threat_horizon_years: f64,

    /// Год регуляторного дедлайна миграции
    pub regulatory_deadline_year: f64,
}

impl Default for AgilityConfig {
    fn default() -> Self {
        Self {
            // Криптография
            rsa_modulus_bits: 2048,
            rsa_strong_modulus_bits: 4096,
            pbkdf2_iterations: 100_000,
            password_min_length: 8,

            // Жизненный цикл
            expiring_soon_horizon: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            rotation_timeout: Duration::from_secs(30),

            // Мониторинг
            threat_assessment_interval: Duration::from_secs(6 * 60 * 60), // 6 hours
            audit_history_limit: 100,
            quantum_capability_year: 2035.0,
            threat_horizon_years: 20.0,
            regulatory_deadline_year: 2035.0,
        }
    }
}

impl AgilityConfig {
    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Переопределяем значения из env, если они заданы
        if let Some(secs) = env_parse::<u64>("AGILITY_THREAT_INTERVAL_SECS") {
            config.threat_assessment_interval = Duration::from_secs(secs);
        }

        if let Some(ms) = env_parse::<u64>("AGILITY_ROTATION_TIMEOUT_MS") {
            config.rotation_timeout = Duration::from_millis(ms);
        }

        if let Some(limit) = env_parse::<usize>("AGILITY_AUDIT_HISTORY_LIMIT") {
            config.audit_history_limit = limit;
        }

        if let Some(bits) = env_parse::<usize>("AGILITY_RSA_MODULUS_BITS") {
            config.rsa_modulus_bits = bits;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}

/// Конфигурация выбора алгоритмов (внешняя поверхность фабрики провайдеров)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub preferred_algorithm: AlgorithmId,
    pub fallback_algorithms: Vec<AlgorithmId>,
    /// Период фоновой проверки ротации, в часах
    pub key_rotation_interval: u64,
    pub enable_hybrid_mode: bool,
    pub quantum_threshold_score: u8,
    /// Только рекомендательный флаг
    pub nist_compliance_required: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            preferred_algorithm: AlgorithmId::HybridEcdhMlKem,
            fallback_algorithms: vec![AlgorithmId::MlKem768, AlgorithmId::Ecdh],
            key_rotation_interval: 24,
            enable_hybrid_mode: true,
            quantum_threshold_score: 70,
            nist_compliance_required: false,
        }
    }
}

impl ProviderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ProviderConfig = serde_json::from_str(json)
            .map_err(|e| CryptoError::InvalidOperation(format!("Invalid provider config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            CryptoError::InvalidOperation(format!("Config serialization failed: {}", e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.quantum_threshold_score > 100 {
            return Err(CryptoError::InvalidOperation(format!(
                "quantumThresholdScore must be within 0..=100, got {}",
                self.quantum_threshold_score
            )));
        }
        if self.key_rotation_interval == 0 {
            return Err(CryptoError::InvalidOperation(
                "keyRotationInterval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn key_rotation_interval(&self) -> Duration {
        Duration::from_secs(self.key_rotation_interval * 60 * 60)
    }

    /// Применить патч (незаданные поля не меняются)
    pub fn merge(&mut self, patch: ProviderConfigPatch) {
        if let Some(preferred) = patch.preferred_algorithm {
            self.preferred_algorithm = preferred;
        }
        if let Some(fallbacks) = patch.fallback_algorithms {
            self.fallback_algorithms = fallbacks;
        }
        if let Some(interval) = patch.key_rotation_interval {
            self.key_rotation_interval = interval;
        }
        if let Some(hybrid) = patch.enable_hybrid_mode {
            self.enable_hybrid_mode = hybrid;
        }
        if let Some(threshold) = patch.quantum_threshold_score {
            self.quantum_threshold_score = threshold;
        }
        if let Some(nist) = patch.nist_compliance_required {
            self.nist_compliance_required = nist;
        }
    }
}

/// Частичное обновление [`ProviderConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfigPatch {
    pub preferred_algorithm: Option<AlgorithmId>,
    pub fallback_algorithms: Option<Vec<AlgorithmId>>,
    pub key_rotation_interval: Option<u64>,
    pub enable_hybrid_mode: Option<bool>,
    pub quantum_threshold_score: Option<u8>,
    pub nist_compliance_required: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgilityConfig::default();
        assert_eq!(config.rsa_modulus_bits, 2048);
        assert_eq!(config.pbkdf2_iterations, 100_000);
        assert_eq!(config.expiring_soon_horizon, Duration::from_secs(604_800));
        assert_eq!(config.audit_history_limit, 100);
        assert_eq!(
            ProviderConfig::default().key_rotation_interval(),
            Duration::from_secs(24 * 3600)
        );
    }

    #[test]
    fn test_provider_config_json_surface() {
        let json = r#"{
            "preferredAlgorithm": "ML-KEM-1024",
            "fallbackAlgorithms": ["Hybrid-ECDH-ML-KEM", "ECDH"],
            "keyRotationInterval": 48,
            "enableHybridMode": false,
            "quantumThresholdScore": 80,
            "nistComplianceRequired": true
        }"#;
        let config = ProviderConfig::from_json(json).unwrap();
        assert_eq!(config.preferred_algorithm, AlgorithmId::MlKem1024);
        assert_eq!(
            config.fallback_algorithms,
            vec![AlgorithmId::HybridEcdhMlKem, AlgorithmId::Ecdh]
        );
        assert_eq!(config.key_rotation_interval(), Duration::from_secs(48 * 3600));
        assert!(config.nist_compliance_required);
    }

    #[test]
    fn test_provider_config_rejects_bad_threshold() {
        let mut config = ProviderConfig::default();
        config.quantum_threshold_score = 101;
        assert!(config.validate().is_err());

        let mut config = ProviderConfig::default();
        config.key_rotation_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut config = ProviderConfig::default();
        let patch: ProviderConfigPatch =
            serde_json::from_str(r#"{"enableHybridMode": false}"#).unwrap();
        config.merge(patch);
        assert!(!config.enable_hybrid_mode);
        assert_eq!(config.preferred_algorithm, AlgorithmId::HybridEcdhMlKem);
        assert_eq!(config.quantum_threshold_score, 70);
    }
}
