//! Logger initialization.
//!
//! Configures `env_logger` with custom formatting. Supports plain text (with
//! colored levels) and JSON for structured log shippers. `RUST_LOG` still
//! overrides the per-module filtering.

use std::io::Write;

use colored::Colorize;
use log::LevelFilter;

use crate::config::LogFormat;

/// Initializes the global logger.
///
/// Defaults to `info` for this crate and quiets the chattier dependencies;
/// set `RUST_LOG` to override.
pub fn init_logger(format: LogFormat) {
    let mut builder = env_logger::Builder::new();

    builder.filter_level(LevelFilter::Info);
    builder.filter_module("sqlx", LevelFilter::Warn);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.parse_default_env();

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
                    chrono::Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    serde_json::to_string(&record.args().to_string())
                        .unwrap_or_else(|_| "\"\"".into())
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let level = record.level();
                let colored_level = match level {
                    log::Level::Error => level.to_string().red(),
                    log::Level::Warn => level.to_string().yellow(),
                    log::Level::Info => level.to_string().green(),
                    log::Level::Debug => level.to_string().blue(),
                    log::Level::Trace => level.to_string().purple(),
                };
                writeln!(
                    buf,
                    "{} [{}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    colored_level,
                    record.args()
                )
            });
        }
    }

    // try_init so tests that race to install a logger don't panic.
    let _ = builder.try_init();
}
