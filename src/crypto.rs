use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::{Engine as _, engine::general_purpose};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// AES Key size for AES256-GCM
const AES_KEY_SIZE: usize = 32; // 256 bits
const NONCE_SIZE: usize = 12; // 96 bits for GCM

pub struct CryptoUtils;

impl CryptoUtils {
    // Argon2id with a fresh salt, PHC string output
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Failed to hash password: {}", e))
    }

    // Ok(false) on mismatch, Err only when the stored hash is malformed
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    // Encrypts data using AES-GCM, returns (ciphertext, nonce)
    pub fn encrypt_data(data: &[u8], key: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        if key.len() != AES_KEY_SIZE {
            return Err(anyhow!("Invalid AES key size"));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("Failed to create AES cipher: {}", e))?;

        let mut nonce_bytes = vec![0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, data)
            .map_err(|e| anyhow!("Failed to encrypt data: {}", e))?;

        Ok((ciphertext, nonce_bytes))
    }

    // Decrypts data using AES-GCM; fails on any tampering
    pub fn decrypt_data(ciphertext: &[u8], key: &[u8], nonce_bytes: &[u8]) -> Result<Vec<u8>> {
        if key.len() != AES_KEY_SIZE {
            return Err(anyhow!("Invalid AES key size"));
        }
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(anyhow!("Invalid Nonce size"));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| anyhow!("Failed to create AES cipher: {}", e))?;
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow!("Failed to decrypt data: {}", e))
    }

    // Cookie-safe base64
    pub fn encode_base64(data: &[u8]) -> String {
        general_purpose::URL_SAFE_NO_PAD.encode(data)
    }

    pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
        general_purpose::URL_SAFE_NO_PAD
            .decode(data)
            .map_err(|e| anyhow!("Failed to decode base64: {}", e))
    }
}

/// What a session token asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub doctor_id: i32,
    /// Unix seconds.
    pub issued_at: i64,
}

/// Key sealing session tokens, derived from the configured secret.
#[derive(Clone)]
pub struct SessionKey {
    key: [u8; AES_KEY_SIZE],
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    /// Token layout: base64url(nonce || AES-GCM(json claims)).
    pub fn seal(&self, claims: &SessionClaims) -> Result<String> {
        let plaintext = serde_json::to_vec(claims)?;
        let (ciphertext, nonce) = CryptoUtils::encrypt_data(&plaintext, &self.key)?;
        let mut token = nonce;
        token.extend_from_slice(&ciphertext);
        Ok(CryptoUtils::encode_base64(&token))
    }

    pub fn open(&self, token: &str) -> Result<SessionClaims> {
        let bytes = CryptoUtils::decode_base64(token)?;
        if bytes.len() <= NONCE_SIZE {
            return Err(anyhow!("Session token too short"));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = CryptoUtils::decrypt_data(ciphertext, &self.key, nonce)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
