//! Fit Battler configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIT_BATTLER_DATABASE_URL` - `PostgreSQL` connection string, only when the
//!   store is `postgres` (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `FIT_BATTLER_STORE` - `memory`, `json` or `postgres` (default: json)
//! - `FIT_BATTLER_DATA_DIR` - Directory for JSON snapshots (default: ./data)
//! - `FIT_BATTLER_CATALOG` - Seed catalog file (default: `<data dir>/catalog.json`)
//! - `FIT_BATTLER_FIT_SLOTS` - Item slots each fit must fill (default: 3)
//! - `FIT_BATTLER_RECENT_LIMIT` - Size of the recent polls window (default: 20)
//! - `FIT_BATTLER_STORE_TIMEOUT_SECS` - Per-call store timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_FIT_SLOTS: usize = 3;
const DEFAULT_RECENT_LIMIT: usize = 20;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which persistence binding to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    Memory,
    #[default]
    Json,
    Postgres,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "json" => Ok(Self::Json),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("expected memory, json or postgres, got '{other}'")),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Json => write!(f, "json"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct BattlerConfig {
    /// Persistence binding
    pub store: StoreKind,
    /// Directory holding JSON snapshot files
    pub data_dir: PathBuf,
    /// Seed catalog file
    pub catalog_path: PathBuf,
    /// `PostgreSQL` connection URL (contains password); set when `store` is `postgres`
    pub database_url: Option<SecretString>,
    /// Item slots each fit must fill before a poll can be published
    pub fit_slots: usize,
    /// Number of polls shown in the recent window
    pub recent_limit: usize,
    /// Upper bound on each store call
    pub store_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl Default for BattlerConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            store: StoreKind::default(),
            catalog_path: data_dir.join("catalog.json"),
            data_dir,
            database_url: None,
            fit_slots: DEFAULT_FIT_SLOTS,
            recent_limit: DEFAULT_RECENT_LIMIT,
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            sentry_dsn: None,
        }
    }
}

impl BattlerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed, or if the store is
    /// `postgres` and no database URL is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let store: StoreKind = parse_env_or_default("FIT_BATTLER_STORE", StoreKind::default())?;
        let data_dir = PathBuf::from(get_env_or_default("FIT_BATTLER_DATA_DIR", "./data"));
        let catalog_path = get_optional_env("FIT_BATTLER_CATALOG")
            .map_or_else(|| data_dir.join("catalog.json"), PathBuf::from);

        let database_url = match store {
            StoreKind::Postgres => Some(get_database_url("FIT_BATTLER_DATABASE_URL")?),
            StoreKind::Memory | StoreKind::Json => None,
        };

        let fit_slots = parse_env_or_default("FIT_BATTLER_FIT_SLOTS", DEFAULT_FIT_SLOTS)?;
        if fit_slots == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "FIT_BATTLER_FIT_SLOTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let recent_limit = parse_env_or_default("FIT_BATTLER_RECENT_LIMIT", DEFAULT_RECENT_LIMIT)?;
        let timeout_secs =
            parse_env_or_default("FIT_BATTLER_STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS)?;

        Ok(Self {
            store,
            data_dir,
            catalog_path,
            database_url,
            fit_slots,
            recent_limit,
            store_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// The database URL, required for Postgres-only commands such as `migrate`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither variable is set.
    pub fn require_database_url(&self) -> Result<SecretString, ConfigError> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => get_database_url("FIT_BATTLER_DATABASE_URL"),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
