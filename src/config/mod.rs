//! Service configuration and constants.
//!
//! This module provides:
//! - Operational constants (batch sizes, pool limits, yield thresholds)
//! - The environment-derived [`Config`] type

mod constants;
mod types;

pub use constants::*;
pub use types::{Config, ConfigError, LogFormat};
