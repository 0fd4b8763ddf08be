//! Envelope codec for message-level encryption.
//!
//! Wire layout (no header, lengths fixed by the algorithm choice):
//!
//! ```text
//! ┌──────────────────────────────┬─────────────┬──────────────────────────┐
//! │ ephemeral public key         │ nonce       │ ciphertext ‖ tag         │
//! │ SPKI DER, P-256 (91 bytes)   │ (12 bytes)  │ (len(plaintext) + 16)    │
//! └──────────────────────────────┴─────────────┴──────────────────────────┘
//! ```
//!
//! Every message uses a fresh ephemeral P-256 key; the AES-256-GCM key is
//! derived with HKDF-SHA256 from the ECDH shared secret (salt = the ephemeral
//! SPKI bytes). Compromise of one ephemeral key exposes only that message.

use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::KeyPair;
use crate::error::{CryptoError, Result};
use crate::utils::b64;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand_core::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

/// SPKI-encoded uncompressed P-256 point
pub const EPHEMERAL_PUBLIC_KEY_LEN: usize = 91;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Smallest valid envelope (empty plaintext)
pub const MIN_ENVELOPE_LEN: usize = EPHEMERAL_PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN;

const HKDF_INFO: &[u8] = b"construct-envelope-v1/aes-256-gcm";
const ALGORITHM: AlgorithmId = AlgorithmId::Ecdh;

/// Borrowed view of the three envelope components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeParts<'a> {
    pub ephemeral_public_key: &'a [u8],
    pub nonce: &'a [u8],
    pub ciphertext: &'a [u8],
}

impl<'a> EnvelopeParts<'a> {
    /// Splits a blob by the fixed component lengths.
    pub fn split(blob: &'a [u8]) -> Result<Self> {
        if blob.len() < MIN_ENVELOPE_LEN {
            return Err(CryptoError::decryption(ALGORITHM));
        }
        let (ephemeral_public_key, rest) = blob.split_at(EPHEMERAL_PUBLIC_KEY_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        Ok(Self {
            ephemeral_public_key,
            nonce,
            ciphertext,
        })
    }

    pub fn join(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(
            self.ephemeral_public_key.len() + self.nonce.len() + self.ciphertext.len(),
        );
        blob.extend_from_slice(self.ephemeral_public_key);
        blob.extend_from_slice(self.nonce);
        blob.extend_from_slice(self.ciphertext);
        blob
    }
}

/// Generates a static P-256 key pair: SPKI DER public half, PKCS#8 DER private half.
pub fn generate_static_key_pair() -> Result<KeyPair> {
    let secret = SecretKey::random(&mut OsRng);
    let public_der = secret
        .public_key()
        .to_public_key_der()
        .map_err(|e| CryptoError::key_generation(ALGORITHM, e))?;
    let private_der = secret
        .to_pkcs8_der()
        .map_err(|e| CryptoError::key_generation(ALGORITHM, e))?;
    Ok(KeyPair::new(
        ALGORITHM,
        public_der.as_bytes().to_vec(),
        private_der.as_bytes().to_vec(),
    ))
}

/// Encrypts `plaintext` for the holder of the SPKI-encoded `recipient_public_key`.
pub fn seal(plaintext: &[u8], recipient_public_key: &[u8]) -> Result<Vec<u8>> {
    let recipient = PublicKey::from_public_key_der(recipient_public_key)
        .map_err(|_| CryptoError::encryption(ALGORITHM, "malformed recipient public key"))?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral
        .public_key()
        .to_public_key_der()
        .map_err(|e| CryptoError::encryption(ALGORITHM, e))?;
    let shared = ephemeral.diffie_hellman(&recipient);

    let key = derive_key(shared.raw_secret_bytes().as_slice(), ephemeral_public.as_bytes())
        .ok_or_else(|| CryptoError::encryption(ALGORITHM, "key derivation failed"))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| CryptoError::encryption(ALGORITHM, e))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::encryption(ALGORITHM, e))?;

    Ok(EnvelopeParts {
        ephemeral_public_key: ephemeral_public.as_bytes(),
        nonce: &nonce,
        ciphertext: &ciphertext,
    }
    .join())
}

/// Decrypts an envelope with the recipient's PKCS#8 private key.
///
/// All failure modes (length, key parsing, tag mismatch) surface as the same
/// `DecryptionFailed`.
pub fn open(blob: &[u8], recipient_private_key: &[u8]) -> Result<Vec<u8>> {
    use tracing::debug;

    let parts = EnvelopeParts::split(blob)?;
    let opened = open_parts(&parts, recipient_private_key);
    if opened.is_none() {
        debug!(target: "crypto::envelope", "Envelope decryption failed");
    }
    opened.ok_or_else(|| CryptoError::decryption(ALGORITHM))
}

fn open_parts(parts: &EnvelopeParts<'_>, recipient_private_key: &[u8]) -> Option<Vec<u8>> {
    let ephemeral_public = PublicKey::from_public_key_der(parts.ephemeral_public_key).ok()?;
    let secret = SecretKey::from_pkcs8_der(recipient_private_key).ok()?;
    let shared =
        p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral_public.as_affine());

    let key = derive_key(shared.raw_secret_bytes().as_slice(), parts.ephemeral_public_key)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).ok()?;
    cipher
        .decrypt(Nonce::from_slice(parts.nonce), parts.ciphertext)
        .ok()
}

fn derive_key(shared_secret: &[u8], salt: &[u8]) -> Option<Zeroizing<[u8; 32]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), shared_secret);
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(HKDF_INFO, okm.as_mut_slice()).ok()?;
    Some(okm)
}

/// [`seal`] + base64 for string transports.
pub fn seal_to_string(plaintext: &[u8], recipient_public_key: &[u8]) -> Result<String> {
    seal(plaintext, recipient_public_key).map(|blob| b64::encode(&blob))
}

/// base64 + [`open`].
pub fn open_from_str(envelope: &str, recipient_private_key: &[u8]) -> Result<Vec<u8>> {
    let blob = b64::decode(envelope).map_err(|_| CryptoError::decryption(ALGORITHM))?;
    open(&blob, recipient_private_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_envelope_layout() {
        let recipient = generate_static_key_pair().unwrap();
        assert_eq!(recipient.public_key().len(), EPHEMERAL_PUBLIC_KEY_LEN);

        let plaintext = b"hello over the relay";
        let blob = seal(plaintext, recipient.public_key()).unwrap();
        assert_eq!(blob.len(), EPHEMERAL_PUBLIC_KEY_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);

        let parts = EnvelopeParts::split(&blob).unwrap();
        // Встроенный ephemeral ключ разбирается как обычный SPKI
        assert!(PublicKey::from_public_key_der(parts.ephemeral_public_key).is_ok());
        assert_eq!(parts.join(), blob);

        assert_eq!(open(&blob, recipient.private_key()).unwrap(), plaintext);
    }

    #[test]
    fn test_fresh_ephemeral_key_per_message() {
        let recipient = generate_static_key_pair().unwrap();
        let first = seal(b"same", recipient.public_key()).unwrap();
        let second = seal(b"same", recipient.public_key()).unwrap();
        assert_ne!(
            &first[..EPHEMERAL_PUBLIC_KEY_LEN],
            &second[..EPHEMERAL_PUBLIC_KEY_LEN]
        );
        assert_ne!(first, second);
    }

    #[test]
    fn test_tampering_and_truncation_fail_uniformly() {
        let recipient = generate_static_key_pair().unwrap();
        let mut blob = seal(b"payload", recipient.public_key()).unwrap();

        let truncated = &blob[..MIN_ENVELOPE_LEN - 1];
        let err = open(truncated, recipient.private_key()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecryptionFailed);

        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let tampered = open(&blob, recipient.private_key()).unwrap_err();
        assert_eq!(tampered, err);
    }

    #[test]
    fn test_wrong_recipient_cannot_open() {
        let alice = generate_static_key_pair().unwrap();
        let mallory = generate_static_key_pair().unwrap();
        let blob = seal(b"for alice", alice.public_key()).unwrap();
        assert!(open(&blob, mallory.private_key()).is_err());
    }

    #[test]
    fn test_string_transport() {
        let recipient = generate_static_key_pair().unwrap();
        let encoded = seal_to_string(b"text message", recipient.public_key()).unwrap();
        assert_eq!(open_from_str(&encoded, recipient.private_key()).unwrap(), b"text message");
        assert!(open_from_str("not base64 !!", recipient.private_key()).is_err());
    }

    #[test]
    fn test_malformed_recipient_key_is_encryption_error() {
        let err = seal(b"x", &[0u8; 91]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncryptionFailed);
    }
}
