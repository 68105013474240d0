use std::time::Duration;

use serde::Deserialize;

/// Longest token lifetime accepted from the environment.
pub const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub hashing: HashConfig,
    pub store_timeout_ms: u64,
}

impl JwtConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs((self.ttl_minutes.max(0) as u64).saturating_mul(60))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.secret.is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&self.ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {}",
            self.ttl_minutes
        );
        Ok(())
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "account-auth".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "account-auth-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24),
        };
        let defaults = HashConfig::default();
        let hashing = HashConfig {
            memory_kib: env_or("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("PASSWORD_HASH_ITERATIONS", defaults.iterations),
            parallelism: env_or("PASSWORD_HASH_PARALLELISM", defaults.parallelism),
        };
        jwt.validate()?;

        Ok(Self {
            database_url,
            jwt,
            hashing,
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", 5_000),
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_expressed_in_minutes() {
        let jwt = JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: 60 * 24,
        };
        assert_eq!(jwt.ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn negative_ttl_clamps_to_zero() {
        let jwt = JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: -5,
        };
        assert_eq!(jwt.ttl(), Duration::ZERO);
    }

    #[test]
    fn huge_ttl_saturates_instead_of_overflowing() {
        let jwt = JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: i64::MAX,
        };
        assert_eq!(jwt.ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn validate_bounds_ttl_and_secret() {
        let mut jwt = JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: 60,
        };
        assert!(jwt.validate().is_ok());
        jwt.ttl_minutes = MAX_TTL_MINUTES;
        assert!(jwt.validate().is_ok());
        for bad in [0, -5, MAX_TTL_MINUTES + 1, i64::MAX] {
            jwt.ttl_minutes = bad;
            assert!(jwt.validate().is_err(), "{bad}");
        }
        jwt.ttl_minutes = 60;
        jwt.secret.clear();
        assert!(jwt.validate().is_err());
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        assert_eq!(env_or::<u32>("ACCOUNT_AUTH_TEST_UNSET_VAR", 7), 7);
    }
}
