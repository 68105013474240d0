use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::{config::HashConfig, error::AuthError};

/// One-way password hashing with Argon2id.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(cfg: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AuthError::Internal(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Parameters are read from the stored hash, so hashes made under an older cost still verify.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AuthError::Internal(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

impl PasswordHasher {
    /// `hash` on the blocking pool, keeping Argon2 off the async workers.
    pub async fn hash_blocking(&self, plain: &str) -> Result<String, AuthError> {
        let hasher = self.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
    }

    /// `verify` on the blocking pool.
    pub async fn verify_blocking(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.clone();
        let (plain, hash) = (plain.to_owned(), hash.to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::new(&HashConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .expect("cheap params are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = cheap_hasher();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = cheap_hasher();
        let hash = hasher
            .hash("correct-horse-battery-staple")
            .expect("hashing should succeed");
        assert!(!hasher.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = cheap_hasher();
        let a = hasher.hash("Secret123").unwrap();
        let b = hasher.hash("Secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = cheap_hasher()
            .verify("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[test]
    fn verify_accepts_hash_made_with_other_cost() {
        let strong = PasswordHasher::new(&HashConfig {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash("Secret123").unwrap();
        assert!(cheap_hasher().verify("Secret123", &hash).unwrap());
    }

    #[tokio::test]
    async fn blocking_pool_variants_agree_with_sync_ones() {
        let hasher = cheap_hasher();
        let hash = hasher.hash_blocking("Secret123").await.unwrap();
        assert!(hasher.verify("Secret123", &hash).unwrap());
        assert!(hasher.verify_blocking("Secret123", &hash).await.unwrap());
        assert!(!hasher.verify_blocking("Secret124", &hash).await.unwrap());
        assert!(matches!(
            hasher.verify_blocking("Secret123", "garbage").await,
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn new_rejects_impossible_params() {
        let res = PasswordHasher::new(&HashConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(res.is_err());
    }
}
