use std::env;
use std::time::Duration;

use crate::booking::RetryPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub database_max_connections: u32,
    pub booking_max_attempts: u32,
    pub booking_retry_backoff_ms: u64,
    pub cache_refresh_secs: u64,
    /// ISO code attached to every amount in responses
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;

        let server_host = var("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let server_port = var("SERVER_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_max_connections = var("DATABASE_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let booking_max_attempts = var("BOOKING_MAX_ATTEMPTS")
            .unwrap_or_else(|| "3".to_string())
            .parse::<u32>()
            .ok()
            .filter(|attempts| *attempts > 0)
            .ok_or(ConfigError::InvalidMaxAttempts)?;

        let booking_retry_backoff_ms = var("BOOKING_RETRY_BACKOFF_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(25);

        let cache_refresh_secs = var("CACHE_REFRESH_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(600);

        let currency = var("CURRENCY").unwrap_or_else(|| "EUR".to_string());

        Ok(Config {
            database_url,
            server_host,
            server_port,
            database_max_connections,
            booking_max_attempts,
            booking_retry_backoff_ms,
            cache_refresh_secs,
            currency,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.booking_max_attempts,
            backoff: Duration::from_millis(self.booking_retry_backoff_ms),
        }
    }

    pub fn cache_refresh(&self) -> Duration {
        Duration::from_secs(self.cache_refresh_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("BOOKING_MAX_ATTEMPTS must be a positive integer")]
    InvalidMaxAttempts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/campsite")]).unwrap();

        assert_eq!(config.server_address(), "127.0.0.1:3000");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.cache_refresh(), Duration::from_secs(600));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(25));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/campsite"),
            ("SERVER_HOST", "0.0.0.0"),
            ("SERVER_PORT", "8080"),
            ("BOOKING_MAX_ATTEMPTS", "5"),
            ("CURRENCY", "CHF"),
        ])
        .unwrap();

        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.currency, "CHF");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingDatabaseUrl)));
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://x"), ("SERVER_PORT", "http")]),
            Err(ConfigError::InvalidPort)
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://x"), ("BOOKING_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::InvalidMaxAttempts)
        ));
    }
}
