use core_config::{FromEnv, database::DatabaseConfig, server::ServerConfig};
use domain_users::{PasswordConfig, TokenConfig};

pub use core_config::Environment;

/// Accounts service configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub password: PasswordConfig,
    pub tokens: TokenConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // Defaults: HOST=0.0.0.0, PORT=8080
        let database = DatabaseConfig::from_env()?; // Required
        let password = PasswordConfig::from_env()?;
        let tokens = TokenConfig::from_env()?; // Required: both JWT secrets

        Ok(Self {
            environment,
            server,
            database,
            password,
            tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "access-secret-that-is-at-least-32-chars";
    const REFRESH: &str = "refresh-secret-that-is-at-least-32-chars";

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("APP_ENV", Some("production")),
                ("PORT", Some("9000")),
                ("DATABASE_URL", Some("postgres://localhost/accounts")),
                ("JWT_SECRET", Some(ACCESS)),
                ("REFRESH_TOKEN_SECRET", Some(REFRESH)),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.environment.is_production());
                assert_eq!(config.server.port, 9000);
                assert_eq!(config.database.url, "postgres://localhost/accounts");
            },
        );
    }

    #[test]
    fn test_config_requires_database_url() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", None),
                ("JWT_SECRET", Some(ACCESS)),
                ("REFRESH_TOKEN_SECRET", Some(REFRESH)),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(err.to_string().contains("DATABASE_URL"));
            },
        );
    }
}
