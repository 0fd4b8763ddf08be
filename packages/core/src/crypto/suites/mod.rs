//! Криптографические наборы (Crypto Suites)
//!
//! Этот модуль содержит конкретные реализации [`CryptoProvider`](super::provider::CryptoProvider).
//!
//! ## Доступные наборы
//!
//! ### Classic
//! - **RSA-OAEP**: 2048 бит (SHA-256), "усиленный" вариант 4096 бит
//! - **ECDH**: P-256 + HKDF-SHA256 + AES-256-GCM (формат конверта)
//!
//! ### Post-Quantum
//! - **ML-KEM-512/768/1024**: KEM + HKDF-SHA256 + ChaCha20-Poly1305
//! - **CRYSTALS-Dilithium**: только подписи (Dilithium3)
//!
//! ### Hybrid
//! - **Hybrid-RSA-ML-KEM**: RSA-OAEP-2048 + ML-KEM-768
//! - **Hybrid-ECDH-ML-KEM**: ECDH P-256 + ML-KEM-768
//!
//! ## Выбор провайдера
//!
//! ```rust,ignore
//! use construct_agility_core::config::AgilityConfig;
//! use construct_agility_core::crypto::{AlgorithmId, Provider};
//!
//! let provider = Provider::new(AlgorithmId::MlKem768, &AgilityConfig::default())?;
//! let keys = provider.generate_key_pair()?;
//! let blob = provider.encrypt(b"hi", keys.public_key())?;
//! ```

pub mod classic;
pub mod hybrid;
pub mod post_quantum;
pub mod signature;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key as AeadKeyChacha, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand_core::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

pub(crate) const AEAD_NONCE_LEN: usize = 12;
pub(crate) const AEAD_TAG_LEN: usize = 16;

/// HKDF-SHA256 from a KEM/DH shared secret to a 256-bit AEAD key.
pub(crate) fn derive_aead_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> Option<Zeroizing<[u8; 32]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(info, okm.as_mut_slice()).ok()?;
    Some(okm)
}

/// ChaCha20-Poly1305 with a fresh random nonce; returns `nonce ‖ ciphertext ‖ tag`.
pub(crate) fn seal_payload(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Option<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(AeadKeyChacha::from_slice(key));
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .ok()?;

    let mut out = Vec::with_capacity(AEAD_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Some(out)
}

/// Inverse of [`seal_payload`].
pub(crate) fn open_payload(key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> Option<Vec<u8>> {
    if sealed.len() < AEAD_NONCE_LEN + AEAD_TAG_LEN {
        return None;
    }
    let (nonce, ciphertext) = sealed.split_at(AEAD_NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(AeadKeyChacha::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .ok()
}
