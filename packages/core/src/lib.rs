// Construct Agility Core
// Crypto-agility engine: classical, post-quantum and hybrid providers,
// key lifecycle and quantum threat monitoring

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

// Модули
pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod scheduler;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use api::{KeyDirectory, MessageSink, SecureMessenger};
pub use config::{AgilityConfig, ProviderConfig, ProviderConfigPatch};
pub use crypto::algorithm::{AlgorithmId, SecurityLevel, SecurityTier};
pub use crypto::factory::ProviderFactory;
pub use crypto::keys::{
    KeyHealthReport, KeyManagementService, KeyMetadata, KeyStatus, RotationReport,
};
pub use crypto::provider::Provider;
pub use crypto::KeyPair;
pub use error::{CryptoError, ErrorKind, Result};
pub use monitor::{SecurityMonitor, ThreatGauge};
pub use scheduler::MaintenanceScheduler;
