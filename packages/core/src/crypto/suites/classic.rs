use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::envelope;
use crate::crypto::provider::{CryptoProvider, EncryptionCapable};
use crate::crypto::{CryptoConfig, Feature, KeyPair};
use crate::error::{CryptoError, Result};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// OAEP overhead for SHA-256: 2 * hLen + 2
const OAEP_SHA256_OVERHEAD: usize = 2 * 32 + 2;
const MIN_MODULUS_BITS: usize = 2048;
const MAX_MODULUS_BITS: usize = 8192;

/// Maximum OAEP/SHA-256 plaintext for a modulus of `modulus_bytes`.
pub fn oaep_capacity(modulus_bytes: usize) -> usize {
    modulus_bytes.saturating_sub(OAEP_SHA256_OVERHEAD)
}

/// RSA-OAEP with SHA-256. Keys travel as SPKI DER (public) and PKCS#8 DER (private).
#[derive(Debug, Clone)]
pub struct RsaOaepProvider {
    modulus_bits: usize,
}

impl RsaOaepProvider {
    pub fn new(modulus_bits: usize) -> Result<Self> {
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&modulus_bits) || modulus_bits % 8 != 0 {
            return Err(CryptoError::AlgorithmNotSupported(format!(
                "RSA-OAEP modulus of {} bits",
                modulus_bits
            )));
        }
        Ok(Self { modulus_bits })
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// 190 bytes for the 2048-bit default, 446 for 4096.
    pub fn max_plaintext_len(&self) -> usize {
        oaep_capacity(self.modulus_bits / 8)
    }

    pub(crate) fn generate_raw(&self) -> Result<RsaPrivateKey> {
        RsaPrivateKey::new(&mut OsRng, self.modulus_bits)
            .map_err(|e| CryptoError::key_generation(AlgorithmId::RsaOaep, e))
    }
}

impl CryptoProvider for RsaOaepProvider {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::RsaOaep
    }

    fn is_supported(&self) -> bool {
        (MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&self.modulus_bits)
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        let private_key = self.generate_raw()?;
        let public_key = RsaPublicKey::from(&private_key);

        let public_der = public_key
            .to_public_key_der()
            .map_err(|e| CryptoError::key_generation(AlgorithmId::RsaOaep, e))?;
        let private_der = private_key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::key_generation(AlgorithmId::RsaOaep, e))?;

        Ok(KeyPair::new(
            AlgorithmId::RsaOaep,
            public_der.as_bytes().to_vec(),
            private_der.as_bytes().to_vec(),
        ))
    }

    fn config(&self) -> CryptoConfig {
        CryptoConfig::describe(
            AlgorithmId::RsaOaep,
            self.modulus_bits / 8,
            vec![Feature::Encryption],
        )
    }
}

impl EncryptionCapable for RsaOaepProvider {
    fn encrypt(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>> {
        let public_key = RsaPublicKey::from_public_key_der(recipient_public_key).map_err(|_| {
            CryptoError::encryption(AlgorithmId::RsaOaep, "malformed recipient public key")
        })?;

        // Лимит проверяется до вызова примитива
        let capacity = oaep_capacity(public_key.size());
        if plaintext.len() > capacity {
            return Err(CryptoError::encryption(
                AlgorithmId::RsaOaep,
                format!(
                    "plaintext of {} bytes exceeds the {}-byte OAEP capacity",
                    plaintext.len(),
                    capacity
                ),
            ));
        }

        public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::encryption(AlgorithmId::RsaOaep, e))
    }

    fn decrypt(&self, ciphertext: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_key)
            .map_err(|_| CryptoError::decryption(AlgorithmId::RsaOaep))?;
        private_key
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|_| CryptoError::decryption(AlgorithmId::RsaOaep))
    }
}

/// ECDH P-256 provider; its encrypt/decrypt pair is the envelope codec.
#[derive(Debug, Clone, Default)]
pub struct EcdhProvider;

impl EcdhProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for EcdhProvider {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::Ecdh
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        envelope::generate_static_key_pair()
    }

    fn config(&self) -> CryptoConfig {
        CryptoConfig::describe(
            AlgorithmId::Ecdh,
            envelope::EPHEMERAL_PUBLIC_KEY_LEN,
            vec![Feature::Encryption],
        )
    }
}

impl EncryptionCapable for EcdhProvider {
    fn encrypt(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>> {
        envelope::seal(plaintext, recipient_public_key)
    }

    fn decrypt(&self, ciphertext: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        envelope::open(ciphertext, private_key)
    }
}
