//! Configuration management

use anyhow::{self, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

use crate::services::routing::MapsConfig;

/// Where proposals and events live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Process-local, lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND '{}' (expected postgres or memory)", other),
        }
    }
}

/// NATS user/password authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsCredentials {
    pub user: String,
    pub password: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS user/password
    pub nats_credentials: Option<NatsCredentials>,

    pub store_backend: StoreBackend,

    /// PostgreSQL connection string (only required for the postgres backend)
    pub database_url: Option<String>,

    /// JSON file of calendar events to seed the memory backend with
    pub memory_events_file: Option<PathBuf>,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// Maps provider settings; `None` runs every estimate in fallback mode
    pub maps: Option<MapsConfig>,

    /// Seed for reproducible fallback estimates
    pub fallback_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nats_url = var("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let nats_credentials = match var("NATS_USER").filter(|user| !user.is_empty()) {
            Some(user) => {
                let password = var("NATS_PASSWORD").context("NATS_PASSWORD must be set when NATS_USER is")?;
                Some(NatsCredentials { user, password })
            }
            None => None,
        };

        let store_backend = match var("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::default(),
        };

        let database_url = var("DATABASE_URL").filter(|url| !url.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set (or use STORE_BACKEND=memory)");
        }

        let memory_events_file = var("MEMORY_EVENTS_FILE").filter(|p| !p.is_empty()).map(PathBuf::from);

        let jwt_secret = var("JWT_SECRET")
            .context("JWT_SECRET must be set, generate one with: openssl rand -base64 48")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        let maps = match var("MAPS_API_KEY").filter(|key| !key.is_empty()) {
            Some(api_key) => {
                let mut maps = MapsConfig::new(api_key);
                if let Some(base_url) = var("MAPS_BASE_URL") {
                    maps.base_url = base_url.trim_end_matches('/').to_string();
                }
                if let Some(timeout) = var("MAPS_TIMEOUT_SECONDS") {
                    maps.timeout_seconds = timeout
                        .parse()
                        .with_context(|| format!("MAPS_TIMEOUT_SECONDS must be a whole number, got '{}'", timeout))?;
                }
                Some(maps)
            }
            None => None,
        };

        let fallback_seed = var("FALLBACK_SEED")
            .map(|seed| {
                seed.parse::<u64>()
                    .with_context(|| format!("FALLBACK_SEED must be an unsigned integer, got '{}'", seed))
            })
            .transpose()?;

        Ok(Self {
            nats_url,
            nats_credentials,
            store_backend,
            database_url,
            memory_events_file,
            jwt_secret,
            maps,
            fallback_seed,
        })
    }

    /// Per-call provider timeout, also used when no provider is configured
    pub fn provider_timeout(&self) -> std::time::Duration {
        let seconds = self
            .maps
            .as_ref()
            .map(|m| m.timeout_seconds)
            .unwrap_or(MapsConfig::DEFAULT_TIMEOUT_SECONDS);
        std::time::Duration::from_secs(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://test"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert!(config.nats_credentials.is_none());
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert!(config.maps.is_none());
        assert!(config.fallback_seed.is_none());
        assert_eq!(config.provider_timeout().as_secs(), 5);
    }

    #[test]
    fn test_config_nats_credentials() {
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("NATS_URL", "nats://broker:4222"),
            ("NATS_USER", "worker"),
            ("NATS_PASSWORD", "hunter2"),
        ])
        .unwrap();
        assert_eq!(config.nats_url, "nats://broker:4222");
        assert_eq!(
            config.nats_credentials,
            Some(NatsCredentials { user: "worker".to_string(), password: "hunter2".to_string() })
        );

        let empty_user = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("NATS_USER", ""),
            ("NATS_PASSWORD", "hunter2"),
        ])
        .unwrap();
        assert!(empty_user.nats_credentials.is_none());

        let missing_password = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("NATS_USER", "worker"),
        ]);
        assert!(missing_password.is_err());
    }

    #[test]
    fn test_config_postgres_requires_database_url() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
    }

    #[test]
    fn test_config_memory_backend_without_database() {
        let config = load(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", SECRET)]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.database_url.is_none());
        assert!(config.memory_events_file.is_none());
    }

    #[test]
    fn test_config_rejects_short_jwt_secret() {
        let result = load(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", "short")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_maps_settings() {
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("MAPS_API_KEY", "key-123"),
            ("MAPS_BASE_URL", "http://localhost:9000/maps/api/"),
            ("MAPS_TIMEOUT_SECONDS", "2"),
        ])
        .unwrap();

        let maps = config.maps.as_ref().unwrap();
        assert_eq!(maps.api_key, "key-123");
        assert_eq!(maps.base_url, "http://localhost:9000/maps/api");
        assert_eq!(config.provider_timeout().as_secs(), 2);
    }

    #[test]
    fn test_config_empty_maps_key_means_fallback_mode() {
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("MAPS_API_KEY", ""),
        ])
        .unwrap();
        assert!(config.maps.is_none());
    }

    #[test]
    fn test_config_fallback_seed() {
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("FALLBACK_SEED", "42"),
        ])
        .unwrap();
        assert_eq!(config.fallback_seed, Some(42));

        let bad = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("FALLBACK_SEED", "abc"),
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("postgresql".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("redis".parse::<StoreBackend>().is_err());
    }
}
