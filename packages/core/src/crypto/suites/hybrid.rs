//! Hybrid classical + ML-KEM-768 composition.
//!
//! Composite keys and ciphertexts share one layout:
//!
//! ```text
//! u32 BE len(classical) ‖ classical part ‖ ML-KEM-768 part
//! ```
//!
//! A ciphertext is `composite(classical_ct, kem_ct) ‖ nonce ‖ ciphertext ‖ tag`.
//! Both shared secrets feed HKDF, so the payload stays protected while either
//! half holds.

use crate::config::AgilityConfig;
use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::provider::{CryptoProvider, EncryptionCapable, KemCapable};
use crate::crypto::suites::classic::{EcdhProvider, RsaOaepProvider};
use crate::crypto::suites::post_quantum::{MlKemParameterSet, MlKemProvider};
use crate::crypto::suites::{derive_aead_key, open_payload, seal_payload};
use crate::crypto::{CryptoConfig, Feature, KeyPair};
use crate::error::{CryptoError, Result};
use p256::ecdh::EphemeralSecret;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rand::rngs::OsRng;
use rand_core::RngCore;
use zeroize::Zeroizing;

const LEN_PREFIX: usize = 4;
const CLASSICAL_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
enum ClassicalHalf {
    Rsa(RsaOaepProvider),
    Ecdh(EcdhProvider),
}

#[derive(Debug, Clone)]
pub struct HybridProvider {
    algorithm: AlgorithmId,
    classical: ClassicalHalf,
    kem: MlKemProvider,
}

/// Packs two byte strings with a length prefix on the first.
pub fn encode_composite(classical: &[u8], post_quantum: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEN_PREFIX + classical.len() + post_quantum.len());
    out.extend_from_slice(&(classical.len() as u32).to_be_bytes());
    out.extend_from_slice(classical);
    out.extend_from_slice(post_quantum);
    out
}

/// Splits a composite value back into `(classical, post_quantum)`.
pub fn decode_composite(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    if bytes.len() < LEN_PREFIX {
        return None;
    }
    let (prefix, rest) = bytes.split_at(LEN_PREFIX);
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

impl HybridProvider {
    pub fn rsa_ml_kem(config: &AgilityConfig) -> Result<Self> {
        Ok(Self {
            algorithm: AlgorithmId::HybridRsaMlKem,
            classical: ClassicalHalf::Rsa(RsaOaepProvider::new(config.rsa_modulus_bits)?),
            kem: MlKemProvider::new(MlKemParameterSet::MlKem768),
        })
    }

    pub fn ecdh_ml_kem() -> Self {
        Self {
            algorithm: AlgorithmId::HybridEcdhMlKem,
            classical: ClassicalHalf::Ecdh(EcdhProvider::new()),
            kem: MlKemProvider::new(MlKemParameterSet::MlKem768),
        }
    }

    fn classical_provider(&self) -> &dyn CryptoProvider {
        match &self.classical {
            ClassicalHalf::Rsa(p) => p,
            ClassicalHalf::Ecdh(p) => p,
        }
    }

    fn info(&self) -> Vec<u8> {
        format!("construct-hybrid-v1/{}", self.algorithm).into_bytes()
    }

    /// Drops the classical half of a hybrid key pair and returns the bare
    /// ML-KEM-768 pair.
    pub fn migrate_to_quantum_safe(&self, keys: &KeyPair) -> Result<KeyPair> {
        if keys.algorithm() != self.algorithm {
            return Err(CryptoError::hybrid(
                self.algorithm,
                format!("cannot migrate a {} key pair", keys.algorithm()),
            ));
        }
        let (_, pq_public) = decode_composite(keys.public_key())
            .ok_or_else(|| CryptoError::hybrid(self.algorithm, "malformed composite public key"))?;
        let (_, pq_private) = decode_composite(keys.private_key())
            .ok_or_else(|| CryptoError::hybrid(self.algorithm, "malformed composite private key"))?;

        Ok(KeyPair::new(self.kem.algorithm(), pq_public.to_vec(), pq_private.to_vec()))
    }

    /// Classical encapsulation: `(ciphertext, shared_secret)`.
    fn classical_encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>)> {
        match &self.classical {
            ClassicalHalf::Rsa(rsa) => {
                let mut secret = Zeroizing::new(vec![0u8; CLASSICAL_SECRET_LEN]);
                OsRng.fill_bytes(secret.as_mut_slice());
                let ct = rsa.encrypt(&secret, public_key)?;
                Ok((ct, secret))
            }
            ClassicalHalf::Ecdh(_) => {
                let recipient =
                    p256::PublicKey::from_public_key_der(public_key).map_err(|_| {
                        CryptoError::encryption(AlgorithmId::Ecdh, "malformed public key")
                    })?;
                let ephemeral = EphemeralSecret::random(&mut OsRng);
                let ephemeral_public = ephemeral
                    .public_key()
                    .to_public_key_der()
                    .map_err(|e| CryptoError::encryption(AlgorithmId::Ecdh, e))?;
                let shared = ephemeral.diffie_hellman(&recipient);
                Ok((
                    ephemeral_public.as_bytes().to_vec(),
                    Zeroizing::new(shared.raw_secret_bytes().to_vec()),
                ))
            }
        }
    }

    fn classical_decapsulate(
        &self,
        private_key: &[u8],
        ciphertext: &[u8],
    ) -> Option<Zeroizing<Vec<u8>>> {
        match &self.classical {
            ClassicalHalf::Rsa(rsa) => {
                rsa.decrypt(ciphertext, private_key).ok().map(Zeroizing::new)
            }
            ClassicalHalf::Ecdh(_) => {
                let ephemeral = p256::PublicKey::from_public_key_der(ciphertext).ok()?;
                let secret = p256::SecretKey::from_pkcs8_der(private_key).ok()?;
                let shared =
                    p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
                Some(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
        }
    }

    fn combine(
        &self,
        classical: &[u8],
        post_quantum: &[u8],
        transcript: &[u8],
    ) -> Option<Zeroizing<[u8; 32]>> {
        let mut ikm = Zeroizing::new(Vec::with_capacity(classical.len() + post_quantum.len()));
        ikm.extend_from_slice(classical);
        ikm.extend_from_slice(post_quantum);
        derive_aead_key(&ikm, transcript, &self.info())
    }

    fn open_inner(&self, ciphertext: &[u8], private_key: &[u8]) -> Option<Vec<u8>> {
        let (classical_sk, pq_sk) = decode_composite(private_key)?;
        let (classical_ct, rest) = decode_composite(ciphertext)?;
        let kem_len = self.kem.parameter_set().ciphertext_len();
        if rest.len() < kem_len {
            return None;
        }
        let (kem_ct, sealed) = rest.split_at(kem_len);
        let transcript_len = ciphertext.len() - sealed.len();
        let transcript = &ciphertext[..transcript_len];

        let classical_secret = self.classical_decapsulate(classical_sk, classical_ct)?;
        let pq_secret = self.kem.decapsulate(pq_sk, kem_ct).ok()?;
        let key = self.combine(&classical_secret, &pq_secret, transcript)?;
        open_payload(&key, sealed, transcript)
    }
}

impl CryptoProvider for HybridProvider {
    fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    fn is_supported(&self) -> bool {
        self.classical_provider().is_supported() && self.kem.is_supported()
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        let classical = self
            .classical_provider()
            .generate_key_pair()
            .map_err(|e| CryptoError::hybrid(self.algorithm, e))?;
        let post_quantum = self
            .kem
            .generate_key_pair()
            .map_err(|e| CryptoError::hybrid(self.algorithm, e))?;

        Ok(KeyPair::new(
            self.algorithm,
            encode_composite(classical.public_key(), post_quantum.public_key()),
            encode_composite(classical.private_key(), post_quantum.private_key()),
        ))
    }

    fn config(&self) -> CryptoConfig {
        let classical = self.classical_provider().config();
        let post_quantum = self.kem.config();
        CryptoConfig::describe(
            self.algorithm,
            LEN_PREFIX + classical.key_size + post_quantum.key_size,
            vec![
                Feature::Encryption,
                Feature::HybridComposition,
                Feature::QuantumMigration,
            ],
        )
    }
}

impl EncryptionCapable for HybridProvider {
    fn encrypt(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>> {
        let (classical_pk, pq_pk) = decode_composite(recipient_public_key)
            .ok_or_else(|| CryptoError::hybrid(self.algorithm, "malformed composite public key"))?;

        let (classical_ct, classical_secret) = self
            .classical_encapsulate(classical_pk)
            .map_err(|e| CryptoError::hybrid(self.algorithm, e))?;
        let (kem_ct, pq_secret) = self
            .kem
            .encapsulate(pq_pk)
            .map_err(|e| CryptoError::hybrid(self.algorithm, e))?;

        let mut blob = encode_composite(&classical_ct, &kem_ct);
        let key = self
            .combine(&classical_secret, &pq_secret, &blob)
            .ok_or_else(|| CryptoError::hybrid(self.algorithm, "key derivation failed"))?;
        let sealed = seal_payload(&key, plaintext, &blob)
            .ok_or_else(|| CryptoError::encryption(self.algorithm, "AEAD encryption failed"))?;

        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    fn decrypt(&self, ciphertext: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        self.open_inner(ciphertext, private_key)
            .ok_or_else(|| CryptoError::decryption(self.algorithm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_composite_codec() {
        let packed = encode_composite(b"classic", b"pq-part");
        assert_eq!(decode_composite(&packed), Some((&b"classic"[..], &b"pq-part"[..])));
        assert_eq!(decode_composite(&[0, 0, 0, 9, 1]), None);
        assert_eq!(decode_composite(&[0, 0]), None);
    }

    #[test]
    fn test_ecdh_hybrid_round_trip() {
        let provider = HybridProvider::ecdh_ml_kem();
        let keys = provider.generate_key_pair().unwrap();
        let blob = provider.encrypt(b"belt and braces", keys.public_key()).unwrap();
        assert_eq!(provider.decrypt(&blob, keys.private_key()).unwrap(), b"belt and braces");
    }

    #[test]
    fn test_tampered_transcript_fails_uniformly() {
        let provider = HybridProvider::ecdh_ml_kem();
        let keys = provider.generate_key_pair().unwrap();
        let mut blob = provider.encrypt(b"payload", keys.public_key()).unwrap();
        // Ломаем байт внутри ML-KEM шифротекста
        blob[LEN_PREFIX + 91 + 10] ^= 0x80;
        let err = provider.decrypt(&blob, keys.private_key()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    }

    #[test]
    fn test_malformed_public_key_is_hybrid_failure() {
        let provider = HybridProvider::ecdh_ml_kem();
        let err = provider.encrypt(b"x", &[0, 0, 0, 91, 1, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HybridModeFailure);
    }

    #[test]
    fn test_migrate_to_quantum_safe() {
        let provider = HybridProvider::ecdh_ml_kem();
        let keys = provider.generate_key_pair().unwrap();
        let pq = provider.migrate_to_quantum_safe(&keys).unwrap();
        assert_eq!(pq.algorithm(), AlgorithmId::MlKem768);
        assert_eq!(pq.public_key().len(), 1184);

        let kem = MlKemProvider::new(MlKemParameterSet::MlKem768);
        let blob = kem.encrypt(b"pure pq", pq.public_key()).unwrap();
        assert_eq!(kem.decrypt(&blob, pq.private_key()).unwrap(), b"pure pq");

        let other = MlKemProvider::new(MlKemParameterSet::MlKem512).generate_key_pair().unwrap();
        assert!(provider.migrate_to_quantum_safe(&other).is_err());
    }
}
