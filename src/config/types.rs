//! Configuration types (environment-only, no CLI dependencies).

use thiserror::Error;

use super::{DEFAULT_DATABASE_URL, DEFAULT_PORT};

/// Errors raised while reading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {variable}: {value:?} ({reason})")]
    InvalidValue {
        /// Name of the offending variable.
        variable: &'static str,
        /// The raw value found in the environment.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-oriented colored lines.
    #[default]
    Plain,
    /// One JSON object per line for log shippers.
    Json,
}

/// Runtime configuration, resolved once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string for the `records` database.
    pub database_url: String,
    /// HTTP listen port.
    pub port: u16,
    /// When `Some(n)` with `n > 0`, every export scans at most `n` rows.
    pub export_row_limit: Option<u64>,
    /// When `Some(n)` with `n > 0`, benchmark runs scan at most `n` rows.
    pub benchmark_row_limit: Option<u64>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            port: DEFAULT_PORT,
            export_row_limit: None,
            benchmark_row_limit: None,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `DATABASE_URL`, `PORT`, `EXPORT_ROW_LIMIT`,
    /// `BENCHMARK_ROW_LIMIT`, `LOG_FORMAT`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is present but does
    /// not parse; missing variables are never an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                variable: "PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let export_row_limit = parse_row_limit("EXPORT_ROW_LIMIT")?;
        let benchmark_row_limit = parse_row_limit("BENCHMARK_ROW_LIMIT")?;

        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Ok(raw) if raw.eq_ignore_ascii_case("plain") => LogFormat::Plain,
            Ok(raw) => {
                return Err(ConfigError::InvalidValue {
                    variable: "LOG_FORMAT",
                    value: raw,
                    reason: "expected \"plain\" or \"json\"".to_string(),
                })
            }
            Err(_) => LogFormat::Plain,
        };

        Ok(Config {
            database_url,
            port,
            export_row_limit,
            benchmark_row_limit,
            log_format,
        })
    }
}

/// Parses an optional row-cap variable. Zero means "no cap", matching the
/// deployment convention of leaving the variable set but disabled.
fn parse_row_limit(variable: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(variable) {
        Ok(raw) => {
            let n = raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                variable,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            Ok(if n > 0 { Some(n) } else { None })
        }
        Err(_) => Ok(None),
    }
}
