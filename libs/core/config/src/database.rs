use crate::{env_parse_or_default, env_required, ConfigError, FromEnv};

/// Database configuration
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// Seconds to wait for a connection before giving up
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            connect_timeout_secs: 8,
        }
    }
}

impl FromEnv for DatabaseConfig {
    /// Requires DATABASE_URL to be set (no default)
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("DATABASE_URL")?,
            max_connections: env_parse_or_default("DATABASE_MAX_CONNECTIONS", 20)?,
            connect_timeout_secs: env_parse_or_default("DATABASE_CONNECT_TIMEOUT_SECS", 8)?,
        })
    }
}
