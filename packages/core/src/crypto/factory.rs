//! Provider factory: config holder, provider cache and fallback chain.
//!
//! Constructed explicitly and passed where needed; there is no global instance.

use crate::config::{AgilityConfig, ProviderConfig, ProviderConfigPatch};
use crate::crypto::algorithm::{AlgorithmId, SecurityLevel};
use crate::crypto::provider::Provider;
use crate::error::{CryptoError, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Instantiator = dyn Fn(AlgorithmId, &AgilityConfig) -> Result<Provider> + Send + Sync;

/// Ordered migration steps between two algorithms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub from: AlgorithmId,
    pub to: AlgorithmId,
    pub steps: Vec<String>,
    /// Set when pre-migration ciphertext stays quantum-vulnerable
    pub requires_reencryption: bool,
}

#[derive(Debug)]
pub struct Migration {
    pub old_provider: Arc<Provider>,
    pub new_provider: Arc<Provider>,
    pub plan: MigrationPlan,
}

pub struct ProviderFactory {
    engine: AgilityConfig,
    config: RwLock<ProviderConfig>,
    cache: RwLock<HashMap<AlgorithmId, Arc<Provider>>>,
    instantiator: Box<Instantiator>,
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("config", &self.config())
            .field("cached", &self.cached_algorithms())
            .finish_non_exhaustive()
    }
}

impl ProviderFactory {
    pub fn new(config: ProviderConfig, engine: AgilityConfig) -> Self {
        Self::with_instantiator(config, engine, Provider::new)
    }

    /// Factory with a custom instantiation function (used by tests to make
    /// chosen algorithms fail).
    pub fn with_instantiator<F>(
        config: ProviderConfig,
        engine: AgilityConfig,
        instantiator: F,
    ) -> Self
    where
        F: Fn(AlgorithmId, &AgilityConfig) -> Result<Provider> + Send + Sync + 'static,
    {
        Self {
            engine,
            config: RwLock::new(config),
            cache: RwLock::new(HashMap::new()),
            instantiator: Box::new(instantiator),
        }
    }

    pub fn engine_config(&self) -> &AgilityConfig {
        &self.engine
    }

    pub fn config(&self) -> ProviderConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn cached_algorithms(&self) -> Vec<AlgorithmId> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let mut algorithms: Vec<_> = cache.keys().copied().collect();
        algorithms.sort();
        algorithms
    }

    /// Returns a provider for `algorithm` (or the preferred one), walking the
    /// fallback list in order when instantiation fails.
    pub fn create_provider(&self, algorithm: Option<AlgorithmId>) -> Result<Arc<Provider>> {
        use tracing::{info, warn};

        let config = self.config();
        let requested = algorithm.unwrap_or(config.preferred_algorithm);

        let mut chain = vec![requested];
        for fallback in &config.fallback_algorithms {
            if !chain.contains(fallback) {
                chain.push(*fallback);
            }
        }

        let mut attempts = Vec::with_capacity(chain.len());
        for candidate in chain {
            match self.provider_for(candidate) {
                Ok(provider) => {
                    if candidate != requested {
                        info!(
                            target: "crypto::factory",
                            requested = %requested,
                            selected = %candidate,
                            "Using fallback provider"
                        );
                    }
                    if let Err(e) = self.check_compliance(candidate) {
                        // Флаг NIST только рекомендательный
                        warn!(target: "crypto::factory", algorithm = %candidate, "{}", e);
                    }
                    return Ok(provider);
                }
                Err(e) => {
                    warn!(
                        target: "crypto::factory",
                        algorithm = %candidate,
                        error = %e,
                        "Provider instantiation failed, trying next fallback"
                    );
                    attempts.push(format!("{} ({})", candidate, e));
                }
            }
        }

        Err(CryptoError::AlgorithmNotSupported(format!(
            "no provider could be instantiated: {}",
            attempts.join(", ")
        )))
    }

    /// Provider for exactly `algorithm`, without fallback.
    pub fn provider_for(&self, algorithm: AlgorithmId) -> Result<Arc<Provider>> {
        use tracing::debug;

        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&algorithm)
        {
            return Ok(Arc::clone(cached));
        }

        let provider = Arc::new((self.instantiator)(algorithm, &self.engine)?);
        debug!(target: "crypto::factory", algorithm = %algorithm, "Provider instantiated");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(algorithm).or_insert(provider)))
    }

    /// Merges `patch` into the config and drops every cached provider.
    pub fn update_config(&self, patch: ProviderConfigPatch) -> Result<()> {
        use tracing::info;

        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = config.clone();
        updated.merge(patch);
        updated.validate()?;
        *config = updated;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = cache.len();
        cache.clear();

        info!(
            target: "crypto::factory",
            preferred = %config.preferred_algorithm,
            dropped_providers = dropped,
            "Provider config updated"
        );
        Ok(())
    }

    pub fn invalidate_cache(&self) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Pure post-quantum only from `quantumThresholdScore` up; hybrid (when
    /// enabled) between 50 and the threshold.
    pub fn recommended_algorithm(&self, threat_score: u8) -> AlgorithmId {
        let config = self.config();
        let threshold = config.quantum_threshold_score;

        if threat_score >= threshold {
            if threat_score >= 90 {
                AlgorithmId::MlKem1024
            } else {
                AlgorithmId::MlKem768
            }
        } else if threat_score >= 50 {
            if config.enable_hybrid_mode {
                AlgorithmId::HybridEcdhMlKem
            } else {
                AlgorithmId::MlKem768
            }
        } else if config.enable_hybrid_mode {
            AlgorithmId::HybridEcdhMlKem
        } else {
            AlgorithmId::Ecdh
        }
    }

    pub fn is_quantum_safe(algorithm: AlgorithmId) -> bool {
        algorithm.is_quantum_safe()
    }

    pub fn security_level(algorithm: AlgorithmId) -> SecurityLevel {
        algorithm.security_level()
    }

    pub fn is_nist_approved(algorithm: AlgorithmId) -> bool {
        algorithm.is_nist_approved()
    }

    /// `NistComplianceViolation` when compliance is required and the
    /// algorithm is not NIST-approved.
    pub fn check_compliance(&self, algorithm: AlgorithmId) -> Result<()> {
        if self.config().nist_compliance_required && !algorithm.is_nist_approved() {
            return Err(CryptoError::NistComplianceViolation(format!(
                "{} is not a NIST-approved algorithm",
                algorithm
            )));
        }
        Ok(())
    }

    /// Builds both providers and the migration plan. Nothing is re-encrypted.
    pub fn migrate_from_algorithm(&self, from: AlgorithmId, to: AlgorithmId) -> Result<Migration> {
        use tracing::info;

        let old_provider = self.provider_for(from)?;
        let new_provider = self.provider_for(to)?;

        let mut steps = vec![
            format!("Generate {} key pairs for every active identity", to),
            format!("Publish the new {} public keys to the key directory", to),
            format!("Encrypt all new outgoing messages with {}", to),
            format!("Keep {} private keys to decrypt messages sent before the switch", from),
            format!("Revoke {} keys once no stored ciphertext depends on them", from),
        ];

        let requires_reencryption =
            from.security_level() == SecurityLevel::QuantumVulnerable && to.is_quantum_safe();
        if requires_reencryption {
            steps.push(format!(
                "WARNING: messages encrypted with {} before the migration remain \
                 quantum-vulnerable until they are re-encrypted; migration does not \
                 re-encrypt them automatically",
                from
            ));
        }

        info!(
            target: "crypto::factory",
            from = %from,
            to = %to,
            steps = steps.len(),
            "Migration plan built"
        );

        Ok(Migration {
            old_provider,
            new_provider,
            plan: MigrationPlan {
                from,
                to,
                steps,
                requires_reencryption,
            },
        })
    }
}
