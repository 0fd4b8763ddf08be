// Запечатывание ключевого материала паролем
// PBKDF2-HMAC-SHA256 для деривации ключа + AES-256-GCM для шифрования

use crate::config::AgilityConfig;
use crate::crypto::algorithm::AlgorithmId;
use crate::crypto::KeyPair;
use crate::error::{CryptoError, Result};
use crate::utils::{b64, serialization};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use chrono::{DateTime, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

// Размеры формата SealedKey v1
const SALT_LENGTH: usize = 32;
const KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;

const FORMAT_VERSION: u8 = 1;

/// Ключевой материал в открытом виде, только в памяти
#[derive(Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
struct MaterialRecord {
    #[serde(with = "serde_bytes")]
    public_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    private_key: Vec<u8>,
}

/// Password-sealed key pair, safe to hand to untrusted storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    pub version: u8,
    pub algorithm: AlgorithmId,
    #[serde(with = "serde_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    pub sealed_at: DateTime<Utc>,
}

impl SealedKey {
    pub fn to_base64(&self) -> Result<String> {
        serialization::to_bytes(self)
            .map(|bytes| b64::encode(&bytes))
            .map_err(CryptoError::InvalidOperation)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = b64::decode(encoded).map_err(CryptoError::InvalidOperation)?;
        serialization::from_bytes(&bytes).map_err(CryptoError::InvalidOperation)
    }

    /// Algorithm name doubles as AEAD associated data.
    fn aad(&self) -> Vec<u8> {
        let mut aad = vec![self.version];
        aad.extend_from_slice(self.algorithm.as_str().as_bytes());
        aad
    }
}

/// Деривировать ключ из пароля с использованием PBKDF2
///
/// # Arguments
/// * `password` - Пользовательский пароль
/// * `salt` - Соль (32 байта)
/// * `iterations` - Количество итераций PBKDF2
pub fn derive_master_key(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    if salt.len() != SALT_LENGTH {
        return Err(CryptoError::InvalidOperation(format!(
            "Invalid salt length: expected {}, got {}",
            SALT_LENGTH,
            salt.len()
        )));
    }

    if password.is_empty() {
        return Err(CryptoError::InvalidOperation(
            "Password cannot be empty".to_string(),
        ));
    }

    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut *key);
    Ok(key)
}

/// Генерировать случайную соль
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Валидация силы пароля
///
/// Минимальные требования:
/// - Длина >= `config.password_min_length`
/// - Содержит буквы и цифры
pub fn validate_password(password: &str, config: &AgilityConfig) -> Result<()> {
    if password.chars().count() < config.password_min_length {
        return Err(CryptoError::InvalidOperation(format!(
            "Password must be at least {} characters long",
            config.password_min_length
        )));
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_numeric());

    if !has_letter || !has_digit {
        return Err(CryptoError::InvalidOperation(
            "Password must contain both letters and numbers".to_string(),
        ));
    }

    Ok(())
}

/// Запечатать пару ключей паролем
pub fn seal_key_pair(keys: &KeyPair, password: &str, config: &AgilityConfig) -> Result<SealedKey> {
    validate_password(password, config)?;

    let algorithm = keys.algorithm();
    let salt = generate_salt();
    let master_key = derive_master_key(password, &salt, config.pbkdf2_iterations)?;

    let record = MaterialRecord {
        public_key: keys.public_key().to_vec(),
        private_key: keys.private_key().to_vec(),
    };
    let plaintext = Zeroizing::new(
        serialization::to_bytes(&record).map_err(|e| CryptoError::encryption(algorithm, e))?,
    );

    let mut nonce = [0u8; NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let mut sealed = SealedKey {
        version: FORMAT_VERSION,
        algorithm,
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext: Vec::new(),
        sealed_at: Utc::now(),
    };

    let cipher = Aes256Gcm::new((&*master_key).into());
    let aad = sealed.aad();
    sealed.ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_slice(),
                aad: &aad,
            },
        )
        .map_err(|e| CryptoError::encryption(algorithm, e))?;

    Ok(sealed)
}

/// Открыть запечатанную пару ключей. Неверный пароль и повреждённые данные
/// дают одну и ту же ошибку.
pub fn open_key_pair(
    sealed: &SealedKey,
    password: &str,
    config: &AgilityConfig,
) -> Result<KeyPair> {
    let algorithm = sealed.algorithm;
    if sealed.version != FORMAT_VERSION || sealed.nonce.len() != NONCE_LENGTH {
        return Err(CryptoError::decryption(algorithm));
    }

    let master_key = derive_master_key(password, &sealed.salt, config.pbkdf2_iterations)
        .map_err(|_| CryptoError::decryption(algorithm))?;
    let cipher = Aes256Gcm::new((&*master_key).into());
    let aad = sealed.aad();

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: sealed.ciphertext.as_slice(),
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::decryption(algorithm))?,
    );

    let mut record: MaterialRecord =
        serialization::from_bytes(&plaintext).map_err(|_| CryptoError::decryption(algorithm))?;

    Ok(KeyPair::new(
        algorithm,
        std::mem::take(&mut record.public_key),
        std::mem::take(&mut record.private_key),
    ))
}
