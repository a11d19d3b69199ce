//! Application configuration loaded from environment variables or a JSON file.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required setting {0}")]
    Missing(&'static str),
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DatabaseConfig {
    /// Builds the connection options field by field, so credentials never
    /// pass through a URL.
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// Process configuration.
///
/// Reads from environment variables:
/// - `CONFIG_FILE`: path of a JSON file to load instead of the variables below
/// - `DB_HOST`: database host; without it the in-memory backend is used
/// - `DB_PORT` (default: `5432`), `DB_USER`, `DB_PASSWORD`, `DB_NAME`
/// - `DB_MAX_CONNECTIONS` (default: `5`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("CONFIG_FILE") {
            return Self::from_json_file(path);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = match lookup("DB_HOST") {
            Some(host) => Some(DatabaseConfig {
                host,
                port: parse_or(&lookup, "DB_PORT", default_port())?,
                user: lookup("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?,
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                name: lookup("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?,
                max_connections: parse_or(
                    &lookup,
                    "DB_MAX_CONNECTIONS",
                    default_max_connections(),
                )?,
            }),
            None => None,
        };

        Ok(Self {
            database,
            log_level: lookup("RUST_LOG").unwrap_or_else(default_log_level),
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::default())?,
        })
    }

    /// Loads configuration from a JSON file with an optional `database`
    /// section.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
