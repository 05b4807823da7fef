//! Runtime configuration read from the environment.
//!
//! Values come from `STUDYDECK_*` variables, optionally loaded from a `.env`
//! file in the working directory. Every setting has a default so the server
//! starts with no configuration at all.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "studydeck.sqlite";
const DEFAULT_UPLOADS_DIR: &str = "./uploads";
const DEFAULT_WORKER_URL: &str = "http://localhost:8081";
const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;
/// Upper bound for synchronous `generate` callers.
const DEFAULT_AGGREGATE_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite file holding the artifact records.
    pub db_path: PathBuf,
    /// Directory where the upload layer stores document files as `{id}_{name}`.
    pub uploads_dir: PathBuf,
    /// Base URL of the generation worker.
    pub worker_url: String,
    pub worker_timeout: Duration,
    pub aggregate_timeout: Duration,
    /// Start generating all artifacts when a document is registered.
    pub auto_generate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            worker_url: DEFAULT_WORKER_URL.to_string(),
            worker_timeout: Duration::from_secs(DEFAULT_WORKER_TIMEOUT_SECS),
            aggregate_timeout: Duration::from_secs(DEFAULT_AGGREGATE_TIMEOUT_SECS),
            auto_generate: true,
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Ok(Self {
            host: lookup("STUDYDECK_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "STUDYDECK_PORT", defaults.port)?,
            db_path: lookup("STUDYDECK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            uploads_dir: lookup("STUDYDECK_UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            worker_url: lookup("STUDYDECK_WORKER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.worker_url),
            worker_timeout: Duration::from_secs(parse_or(
                &lookup,
                "STUDYDECK_WORKER_TIMEOUT_SECS",
                DEFAULT_WORKER_TIMEOUT_SECS,
            )?),
            aggregate_timeout: Duration::from_secs(parse_or(
                &lookup,
                "STUDYDECK_AGGREGATE_TIMEOUT_SECS",
                DEFAULT_AGGREGATE_TIMEOUT_SECS,
            )?),
            auto_generate: parse_bool_or(
                &lookup,
                "STUDYDECK_AUTO_GENERATE",
                defaults.auto_generate,
            )?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            match normalized.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { key, value }),
            }
        }
        None => Ok(default),
    }
}
