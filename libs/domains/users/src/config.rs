//! Env-driven settings for password hashing and token signing.

use core_config::{ConfigError, FromEnv, env_parse_or_default, env_required};
use std::fmt;
use std::time::Duration;

const MIN_SECRET_LEN: usize = 32;
/// Ten years
const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Argon2id cost parameters.
///
/// - `PASSWORD_HASH_MEMORY_KIB` (default 19456)
/// - `PASSWORD_HASH_ITERATIONS` (default 2)
/// - `PASSWORD_HASH_PARALLELISM` (default 1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl FromEnv for PasswordConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            memory_kib: env_parse_or_default("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_parse_or_default("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: env_parse_or_default("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        })
    }
}

/// Signing secrets and lifetimes for access and refresh tokens.
///
/// Loaded from:
/// - `JWT_SECRET` (required, at least 32 chars)
/// - `REFRESH_TOKEN_SECRET` (required, at least 32 chars, different from `JWT_SECRET`)
/// - `JWT_EXPIRY_SECS` (default 900)
/// - `REFRESH_TOKEN_EXPIRY_SECS` (default 604800)
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
    pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    /// Builds a config with default lifetimes, applying the same secret rules as `from_env`.
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Self::DEFAULT_ACCESS_TTL,
            refresh_ttl: Self::DEFAULT_REFRESH_TTL,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_secret("JWT_SECRET", &self.access_secret)?;
        check_secret("REFRESH_TOKEN_SECRET", &self.refresh_secret)?;
        check_ttl("JWT_EXPIRY_SECS", self.access_ttl)?;
        check_ttl("REFRESH_TOKEN_EXPIRY_SECS", self.refresh_ttl)?;

        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::Invalid {
                key: "REFRESH_TOKEN_SECRET".to_string(),
                details: "must differ from JWT_SECRET".to_string(),
            });
        }
        Ok(())
    }
}

fn check_secret(key: &str, secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            details: format!(
                "must be at least {} characters (got {}). Generate one with: openssl rand -base64 32",
                MIN_SECRET_LEN,
                secret.len()
            ),
        });
    }
    Ok(())
}

fn check_ttl(key: &str, ttl: Duration) -> Result<(), ConfigError> {
    if ttl.is_zero() || ttl > MAX_TOKEN_TTL {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            details: format!(
                "must be between 1 and {} seconds (got {})",
                MAX_TOKEN_TTL.as_secs(),
                ttl.as_secs()
            ),
        });
    }
    Ok(())
}

impl FromEnv for TokenConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let access_secret = env_required("JWT_SECRET")?;
        let refresh_secret = env_required("REFRESH_TOKEN_SECRET")?;
        let access_secs =
            env_parse_or_default("JWT_EXPIRY_SECS", Self::DEFAULT_ACCESS_TTL.as_secs())?;
        let refresh_secs = env_parse_or_default(
            "REFRESH_TOKEN_EXPIRY_SECS",
            Self::DEFAULT_REFRESH_TTL.as_secs(),
        )?;

        let config = Self {
            access_secret,
            refresh_secret,
            access_ttl: Duration::from_secs(access_secs),
            refresh_ttl: Duration::from_secs(refresh_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

// Secrets stay out of logs
impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "access-secret-that-is-at-least-32-chars";
    const REFRESH: &str = "refresh-secret-that-is-at-least-32-chars";

    #[test]
    fn test_password_config_defaults() {
        temp_env::with_vars_unset(
            [
                "PASSWORD_HASH_MEMORY_KIB",
                "PASSWORD_HASH_ITERATIONS",
                "PASSWORD_HASH_PARALLELISM",
            ],
            || {
                let config = PasswordConfig::from_env().unwrap();
                assert_eq!(config, PasswordConfig::default());
            },
        );
    }

    #[test]
    fn test_password_config_rejects_garbage() {
        temp_env::with_var("PASSWORD_HASH_ITERATIONS", Some("lots"), || {
            assert!(PasswordConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_token_config_from_env() {
        temp_env::with_vars(
            [
                ("JWT_SECRET", Some(ACCESS)),
                ("REFRESH_TOKEN_SECRET", Some(REFRESH)),
                ("JWT_EXPIRY_SECS", Some("60")),
                ("REFRESH_TOKEN_EXPIRY_SECS", None),
            ],
            || {
                let config = TokenConfig::from_env().unwrap();
                assert_eq!(config.access_ttl, Duration::from_secs(60));
                assert_eq!(config.refresh_ttl, TokenConfig::DEFAULT_REFRESH_TTL);
            },
        );
    }

    #[test]
    fn test_token_config_requires_refresh_secret() {
        temp_env::with_vars(
            [("JWT_SECRET", Some(ACCESS)), ("REFRESH_TOKEN_SECRET", None)],
            || {
                let err = TokenConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "REFRESH_TOKEN_SECRET"));
            },
        );
    }

    #[test]
    fn test_token_config_rejects_out_of_range_lifetimes() {
        let huge = u64::MAX.to_string();
        temp_env::with_vars(
            [
                ("JWT_SECRET", Some(ACCESS)),
                ("REFRESH_TOKEN_SECRET", Some(REFRESH)),
                ("JWT_EXPIRY_SECS", None),
                ("REFRESH_TOKEN_EXPIRY_SECS", Some(huge.as_str())),
            ],
            || {
                let err = TokenConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "REFRESH_TOKEN_EXPIRY_SECS"));
            },
        );

        temp_env::with_vars(
            [
                ("JWT_SECRET", Some(ACCESS)),
                ("REFRESH_TOKEN_SECRET", Some(REFRESH)),
                ("JWT_EXPIRY_SECS", Some("0")),
                ("REFRESH_TOKEN_EXPIRY_SECS", None),
            ],
            || {
                let err = TokenConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "JWT_EXPIRY_SECS"));
            },
        );
    }

    #[test]
    fn test_token_config_rejects_short_or_shared_secrets() {
        assert!(TokenConfig::new("short", REFRESH).is_err());
        assert!(TokenConfig::new(ACCESS, ACCESS).is_err());
        assert!(TokenConfig::new(ACCESS, REFRESH).is_ok());
    }

    #[test]
    fn test_token_config_debug_redacts_secrets() {
        let config = TokenConfig::new(ACCESS, REFRESH).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(ACCESS));
        assert!(debug.contains("REDACTED"));
    }
}
