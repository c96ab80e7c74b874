// src/common/crypto.rs

//! Hash de chaves de API e cifragem simétrica de segredos de conectores.
//!
//! As duas operações nunca se misturam: o hash é de mão única (SHA-256,
//! sem salt, pois a chave já carrega 256 bits de entropia) e a cifragem
//! é AES-256-GCM com a `ENCRYPTION_KEY` usada diretamente como chave.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Tamanho exato da chave AES-256, em bytes.
pub const ENCRYPTION_KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("chave de criptografia ausente ou inválida")]
    KeyUnavailable,

    #[error("falha ao cifrar o segredo")]
    EncryptionFailed,

    #[error("falha ao decifrar o segredo")]
    DecryptionFailed,
}

/// SHA-256 em hexadecimal do valor completo da chave.
pub fn hash_secret(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Comparação em tempo constante, para não vazar informação por timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// `n` bytes aleatórios do CSPRNG do sistema operacional, em hexadecimal.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cifra de segredos de conectores (ex.: chaves do provedor de pagamento).
#[derive(Clone)]
pub struct SecretCipher {
    key: Option<[u8; ENCRYPTION_KEY_LENGTH]>,
}

impl SecretCipher {
    /// Uma chave com tamanho diferente de 32 deixa a cifra indisponível.
    pub fn new(encryption_key: Option<&str>) -> Self {
        let key = encryption_key
            .map(str::as_bytes)
            .filter(|bytes| bytes.len() == ENCRYPTION_KEY_LENGTH)
            .map(|bytes| {
                let mut key = [0u8; ENCRYPTION_KEY_LENGTH];
                key.copy_from_slice(bytes);
                key
            });
        Self { key }
    }

    pub fn is_available(&self) -> bool {
        self.key.is_some()
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        let key = self.key.as_ref().ok_or(CryptoError::KeyUnavailable)?;
        Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::KeyUnavailable)
    }

    /// Retorna `base64(nonce || ciphertext || tag)`.
    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    pub fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        let cipher = self.cipher()?;

        let bytes = STANDARD
            .decode(sealed)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        if bytes.len() <= NONCE_LENGTH {
            return Err(CryptoError::DecryptionFailed);
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LENGTH);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Para quem consome a configuração de um conector: se não for possível
    /// decifrar (chave trocada, dado corrompido), a configuração é tratada
    /// como ausente.
    pub fn open_or_absent(&self, sealed: Option<&str>) -> Option<String> {
        let sealed = sealed?;
        match self.open(sealed) {
            Ok(plain) => Some(plain),
            Err(e) => {
                tracing::warn!(error = %e, "Segredo de conector ilegível; tratando como ausente");
                None
            }
        }
    }
}
