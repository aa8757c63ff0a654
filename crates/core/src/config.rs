use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::score::{MATCH_THRESHOLD, NOTIFY_THRESHOLD, PROPENSITY_TTL_HOURS};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub intelligence: IntelligenceConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Knobs for the intelligence engine. Thresholds are percentages on the
/// 0-100 score scale.
#[derive(Clone, Debug)]
pub struct IntelligenceConfig {
    pub match_threshold: f64,
    pub notify_threshold: f64,
    pub propensity_ttl_hours: i64,
    /// Upper bound on concurrent batch items.
    pub batch_concurrency: usize,
    /// Per batch item; a slow item is skipped, not the run.
    pub item_timeout_secs: u64,
    pub notify_webhook_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub batch_concurrency: Option<usize>,
    pub notify_webhook_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    logging: FileLogging,
    #[serde(default)]
    intelligence: FileIntelligence,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServer {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct FileIntelligence {
    match_threshold: Option<f64>,
    notify_threshold: Option<f64>,
    propensity_ttl_hours: Option<i64>,
    batch_concurrency: Option<usize>,
    item_timeout_secs: Option<u64>,
    notify_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options
            .config_path
            .or_else(|| env::var("DEALSENSE_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("dealsense.toml"));

        let file = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
            toml::from_str::<FileConfig>(&raw)
                .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?
        } else if options.require_file {
            return Err(ConfigError::MissingConfigFile(path));
        } else {
            FileConfig::default()
        };

        let config = Self::assemble(file, &options.overrides)?;
        config.validate()?;
        Ok(config)
    }

    fn assemble(file: FileConfig, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let database = DatabaseConfig {
            url: overrides
                .database_url
                .clone()
                .or_else(|| env::var("DATABASE_URL").ok())
                .or(file.database.url)
                .unwrap_or_else(|| "sqlite://dealsense.db".to_owned()),
            max_connections: file.database.max_connections.unwrap_or(5),
            timeout_secs: file.database.timeout_secs.unwrap_or(30),
        };

        let server = ServerConfig {
            bind_address: env::var("DEALSENSE_BIND_ADDRESS")
                .ok()
                .or(file.server.bind_address)
                .unwrap_or_else(|| "127.0.0.1".to_owned()),
            port: parse_env("DEALSENSE_PORT")?.or(file.server.port).unwrap_or(8080),
        };

        let logging = LoggingConfig {
            level: overrides
                .log_level
                .clone()
                .or_else(|| env::var("DEALSENSE_LOG_LEVEL").ok())
                .or(file.logging.level)
                .unwrap_or_else(|| "info".to_owned()),
            format: file.logging.format.unwrap_or(LogFormat::Compact),
        };

        let intelligence = IntelligenceConfig {
            match_threshold: file.intelligence.match_threshold.unwrap_or(MATCH_THRESHOLD),
            notify_threshold: file.intelligence.notify_threshold.unwrap_or(NOTIFY_THRESHOLD),
            propensity_ttl_hours: file
                .intelligence
                .propensity_ttl_hours
                .unwrap_or(PROPENSITY_TTL_HOURS),
            batch_concurrency: overrides
                .batch_concurrency
                .or(parse_env("DEALSENSE_BATCH_CONCURRENCY")?)
                .or(file.intelligence.batch_concurrency)
                .unwrap_or(8),
            item_timeout_secs: file.intelligence.item_timeout_secs.unwrap_or(30),
            notify_webhook_url: overrides
                .notify_webhook_url
                .clone()
                .or_else(|| env::var("DEALSENSE_WEBHOOK_URL").ok())
                .or(file.intelligence.notify_webhook_url),
        };

        Ok(Self { database, server, logging, intelligence })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_owned()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_owned(),
            ));
        }
        for (name, value) in [
            ("intelligence.match_threshold", self.intelligence.match_threshold),
            ("intelligence.notify_threshold", self.intelligence.notify_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Validation(format!("{name} must be within 0..=100")));
            }
        }
        if self.intelligence.propensity_ttl_hours < 1 {
            return Err(ConfigError::Validation(
                "intelligence.propensity_ttl_hours must be at least 1".to_owned(),
            ));
        }
        if self.intelligence.batch_concurrency == 0 {
            return Err(ConfigError::Validation(
                "intelligence.batch_concurrency must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value }),
        Err(_) => Ok(None),
    }
}
