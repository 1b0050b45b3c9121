use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::db::readiness::WaitOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("Failed to parse TOML from config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub log_dir: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub max_connections: u32,
    pub db_wait_interval_ms: u64,
    /// `None` waits for the database indefinitely.
    pub db_wait_max_attempts: Option<u32>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialServerConfig {
    database_url: Option<String>,
    jwt_secret: Option<String>,
    bind_addr: Option<String>,
    log_dir: Option<String>,
    token_ttl_hours: Option<i64>,
    bcrypt_cost: Option<u32>,
    max_connections: Option<u32>,
    db_wait_interval_ms: Option<u64>,
    db_wait_max_attempts: Option<u32>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_max_connections() -> u32 {
    10
}

fn default_db_wait_interval_ms() -> u64 {
    1000
}

impl PartialServerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn from_file(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path_str) = config_path else {
            return Ok(Self::default());
        };

        let path = Path::new(path_str);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

impl ServerConfig {
    /// Loads `.env`, then the optional TOML file, then environment variables.
    /// Environment variables win over the file.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = PartialServerConfig::from_file(config_path)?;
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()?;

        Self::merge(env_config, file_config)
    }

    /// Merges two layers, `primary` taking precedence over `fallback`.
    pub fn merge(primary: PartialServerConfig, fallback: PartialServerConfig) -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            database_url: primary
                .database_url
                .or(fallback.database_url)
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            jwt_secret: primary
                .jwt_secret
                .or(fallback.jwt_secret)
                .ok_or(ConfigError::Missing("JWT_SECRET"))?,
            bind_addr: primary
                .bind_addr
                .or(fallback.bind_addr)
                .unwrap_or_else(default_bind_addr),
            log_dir: primary.log_dir.or(fallback.log_dir).unwrap_or_else(default_log_dir),
            token_ttl_hours: primary
                .token_ttl_hours
                .or(fallback.token_ttl_hours)
                .unwrap_or_else(default_token_ttl_hours),
            bcrypt_cost: primary
                .bcrypt_cost
                .or(fallback.bcrypt_cost)
                .unwrap_or_else(default_bcrypt_cost),
            max_connections: primary
                .max_connections
                .or(fallback.max_connections)
                .unwrap_or_else(default_max_connections),
            db_wait_interval_ms: primary
                .db_wait_interval_ms
                .or(fallback.db_wait_interval_ms)
                .unwrap_or_else(default_db_wait_interval_ms),
            db_wait_max_attempts: primary.db_wait_max_attempts.or(fallback.db_wait_max_attempts),
        })
    }

    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            interval: Duration::from_millis(self.db_wait_interval_ms),
            max_attempts: self.db_wait_max_attempts,
        }
    }
}
