//! Process configuration read from the environment. The server loads `.env` first.

use std::{net::SocketAddr, str::FromStr};

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://backoffice.db";
pub const DEFAULT_IGV_RATE: f64 = 0.18;
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Initial administrator created on an empty database
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
    pub admin: Option<AdminSeed>,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
    pub igv_rate: f64,
    pub max_page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => DEV_JWT_SECRET.to_string(),
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse(&get, "PORT", 8080)?,
            jwt_secret,
            jwt_ttl_minutes: parse(&get, "JWT_TTL_MINUTES", 480)?,
            admin,
            cors_origins,
            igv_rate: parse(&get, "IGV_RATE", DEFAULT_IGV_RATE)?,
            max_page_size: parse(&get, "MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?,
        };

        if !(0.0..1.0).contains(&config.igv_rate) {
            return Err(ConfigError::Invalid {
                key: "IGV_RATE",
                value: config.igv_rate.to_string(),
            });
        }
        if config.max_page_size < 1 {
            return Err(ConfigError::Invalid {
                key: "MAX_PAGE_SIZE",
                value: config.max_page_size.to_string(),
            });
        }
        if config.jwt_ttl_minutes < 1 {
            return Err(ConfigError::Invalid {
                key: "JWT_TTL_MINUTES",
                value: config.jwt_ttl_minutes.to_string(),
            });
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::Invalid {
            key: "HOST",
            value: self.host.clone(),
        })
    }

    /// Settings for tests: in-memory database, fixed secret, defaults elsewhere
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_minutes: 60,
            admin: None,
            cors_origins: Vec::new(),
            igv_rate: DEFAULT_IGV_RATE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

fn parse<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_ttl_minutes, 480);
        assert_eq!(config.igv_rate, 0.18);
        assert_eq!(config.max_page_size, 100);
        assert!(config.admin.is_none());
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = config(&[
            ("JWT_SECRET", "x"),
            ("CORS_ORIGINS", "http://localhost:5173, https://erp.example.pe,"),
        ])
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:5173", "https://erp.example.pe"]
        );
    }

    #[test]
    fn admin_seed_needs_both_values() {
        let only_email = config(&[("JWT_SECRET", "x"), ("ADMIN_EMAIL", "admin@obra.pe")]).unwrap();
        assert!(only_email.admin.is_none());

        let both = config(&[
            ("JWT_SECRET", "x"),
            ("ADMIN_EMAIL", "admin@obra.pe"),
            ("ADMIN_PASSWORD", "supersecreto"),
        ])
        .unwrap();
        assert_eq!(both.admin.unwrap().email, "admin@obra.pe");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(matches!(
            config(&[("JWT_SECRET", "x"), ("PORT", "http")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", "x"), ("IGV_RATE", "18")]),
            Err(ConfigError::Invalid { key: "IGV_RATE", .. })
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", "x"), ("MAX_PAGE_SIZE", "0")]),
            Err(ConfigError::Invalid { key: "MAX_PAGE_SIZE", .. })
        ));
    }

    #[test]
    fn socket_addr_combines_host_and_port() {
        let config = config(&[("JWT_SECRET", "x"), ("HOST", "0.0.0.0"), ("PORT", "9000")]).unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9000");
    }
}
