use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;

use crate::config::PasswordConfig;
use crate::error::{UserError, UserResult};

/// Argon2id password hashing.
///
/// Hashing and verification run on the blocking pool. `verify` never errors:
/// a malformed hash counts as a mismatch.
#[derive(Clone)]
pub struct EncryptService {
    argon2: Argon2<'static>,
    /// Hash of a throwaway password, used to burn the same CPU on login
    /// paths that fail before a real verification.
    dummy_hash: Arc<str>,
}

impl EncryptService {
    pub fn new(config: &PasswordConfig) -> UserResult<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| UserError::PasswordHash(format!("invalid argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let dummy_hash = hash_with(&argon2, "dummy-password-for-timing")?;

        Ok(Self {
            argon2,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Hashes a plaintext password into a PHC string with a fresh salt.
    pub async fn hash(&self, plaintext: &str) -> UserResult<String> {
        let argon2 = self.argon2.clone();
        let plaintext = plaintext.to_owned();

        tokio::task::spawn_blocking(move || hash_with(&argon2, &plaintext))
            .await
            .map_err(|e| UserError::PasswordHash(format!("hash task failed: {}", e)))?
    }

    /// Checks a plaintext password against a stored PHC string.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let argon2 = self.argon2.clone();
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();

        match tokio::task::spawn_blocking(move || verify_with(&argon2, &plaintext, &hash)).await {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!("Password verify task failed: {}", e);
                false
            }
        }
    }

    /// Spends one verification worth of CPU and discards the result.
    pub async fn verify_dummy(&self, plaintext: &str) {
        let dummy = self.dummy_hash.clone();
        let _ = self.verify(plaintext, &dummy).await;
    }
}

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

fn verify_with(argon2: &Argon2<'_>, plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
pub(crate) fn test_encrypt_service() -> EncryptService {
    EncryptService::new(&PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}
