//! exportd library: streaming multi-format export of the `records` table.
//!
//! The crate turns a Postgres table of unbounded size into CSV, JSON, XML or
//! Parquet byte streams with optional gzip, while keeping resident memory
//! bounded by a single fetch batch. The HTTP surface is a thin axum layer;
//! the interesting part is the pull-driven pipeline in [`export`].
//!
//! # Example
//!
//! ```no_run
//! use exportd::config::Config;
//! use exportd::server;
//! use exportd::storage::init_db_pool;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let pool = init_db_pool(&config.database_url).await?;
//! server::serve(config, pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime and a reachable Postgres instance
//! holding the `records` table. Use `#[tokio::main]` in your application or
//! ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod app;
pub mod benchmark;
pub mod config;
pub mod error_handling;
pub mod export;
pub mod jobs;
pub mod model;
pub mod server;
pub mod storage;

// Re-export the types a binary or test touches most often.
pub use config::Config;
pub use error_handling::ExportError;
pub use jobs::{ExportJob, JobRegistry, JobStatus};
pub use model::{ColumnMapping, Compression, ExportFormat, ExportRequest, Value};
