use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::provider::{CryptoProvider, SignatureCapable};
use crate::crypto::{CryptoConfig, Feature, KeyPair};
use crate::error::{CryptoError, Result};
use pqcrypto_dilithium::dilithium3;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};

const ALGORITHM: AlgorithmId = AlgorithmId::Dilithium;

/// CRYSTALS-Dilithium (parameter set 3) detached signatures.
#[derive(Debug, Clone, Default)]
pub struct DilithiumProvider;

impl DilithiumProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn signature_len(&self) -> usize {
        dilithium3::signature_bytes()
    }
}

impl CryptoProvider for DilithiumProvider {
    fn algorithm(&self) -> AlgorithmId {
        ALGORITHM
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        let (pk, sk) = dilithium3::keypair();
        Ok(KeyPair::new(ALGORITHM, pk.as_bytes().to_vec(), sk.as_bytes().to_vec()))
    }

    fn config(&self) -> CryptoConfig {
        CryptoConfig::describe(ALGORITHM, dilithium3::public_key_bytes(), vec![Feature::Signatures])
    }
}

impl SignatureCapable for DilithiumProvider {
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        let sk = dilithium3::SecretKey::from_bytes(private_key)
            .map_err(|_| CryptoError::signature(ALGORITHM, "malformed signing key"))?;
        Ok(dilithium3::detached_sign(message, &sk).as_bytes().to_vec())
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()> {
        let pk = dilithium3::PublicKey::from_bytes(public_key)
            .map_err(|_| CryptoError::signature(ALGORITHM, "malformed verifying key"))?;
        let sig = dilithium3::DetachedSignature::from_bytes(signature)
            .map_err(|_| CryptoError::signature(ALGORITHM, "malformed signature"))?;
        dilithium3::verify_detached_signature(&sig, message, &pk)
            .map_err(|_| CryptoError::signature(ALGORITHM, "signature does not verify"))
    }
}
