use std::env;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url_prod: String,
    pub frontend_url_dev: String,
    pub db_pool_size: u32,
    pub change_feed_capacity: usize,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "{} must be set in environment variables or .env file", key)
            }
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has an invalid value: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let or_default =
            |key: &'static str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(AppConfig {
            database_url,
            host: or_default("HOST", "0.0.0.0"),
            port: parse_number("PORT", or_default("PORT", "8080"))?,
            frontend_url_prod: or_default("FRONTEND_URL_PROD", "https://ghost-goal.vercel.app"),
            frontend_url_dev: or_default("FRONTEND_URL_DEV", "http://localhost:5173"),
            db_pool_size: parse_number("DB_POOL_SIZE", or_default("DB_POOL_SIZE", "10"))?,
            change_feed_capacity: parse_number(
                "CHANGE_FEED_CAPACITY",
                or_default("CHANGE_FEED_CAPACITY", "256"),
            )?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&'static str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(config_from(&[]), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/ghost")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_pool_size, 10);
        assert_eq!(config.change_feed_capacity, 256);
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = config_from(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "eighty".to_string()
            }
        );
    }
}
