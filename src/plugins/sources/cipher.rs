use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use std::sync::Arc;

use crate::config::DecryptionConfig;
use crate::utils::error::{AppError, Result};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Turns an opaque API payload into plaintext bytes.
pub trait PayloadDecryptor: Send + Sync {
    fn decrypt(&self, payload: &str) -> Result<Vec<u8>>;
}

/// AES-256-CBC with PKCS#7 padding over a base64 payload.
pub struct AesCbcDecryptor {
    key: [u8; 32],
    iv: [u8; 16],
}

impl AesCbcDecryptor {
    pub fn new(key: [u8; 32], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self> {
        let key: [u8; 32] = hex::decode(key_hex)
            .map_err(|e| AppError::Decryption(format!("invalid key hex: {}", e)))?
            .try_into()
            .map_err(|_| AppError::Decryption("key must be 32 bytes".to_string()))?;
        let iv: [u8; 16] = hex::decode(iv_hex)
            .map_err(|e| AppError::Decryption(format!("invalid iv hex: {}", e)))?
            .try_into()
            .map_err(|_| AppError::Decryption("iv must be 16 bytes".to_string()))?;
        Ok(Self::new(key, iv))
    }
}

impl PayloadDecryptor for AesCbcDecryptor {
    fn decrypt(&self, payload: &str) -> Result<Vec<u8>> {
        let ciphertext = STANDARD
            .decode(payload.trim())
            .map_err(|e| AppError::Decryption(format!("payload is not base64: {}", e)))?;

        Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|e| AppError::Decryption(format!("bad ciphertext or padding: {}", e)))
    }
}

/// Used when no key material is configured; every payload fails.
pub struct MissingKeyDecryptor;

impl PayloadDecryptor for MissingKeyDecryptor {
    fn decrypt(&self, _payload: &str) -> Result<Vec<u8>> {
        Err(AppError::Decryption("no decryption key configured".to_string()))
    }
}

pub fn decryptor_from_config(config: &DecryptionConfig) -> Result<Arc<dyn PayloadDecryptor>> {
    match (&config.key_hex, &config.iv_hex) {
        (Some(key), Some(iv)) => Ok(Arc::new(AesCbcDecryptor::from_hex(key, iv)?)),
        (None, None) => Ok(Arc::new(MissingKeyDecryptor)),
        _ => Err(AppError::Decryption(
            "key_hex and iv_hex must be configured together".to_string(),
        )),
    }
}
