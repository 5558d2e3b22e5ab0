//! Error type definitions.
//!
//! Everything that can fail in the export pipeline is collapsed into
//! [`ExportError`]; the server module is the only place that translates a
//! variant into an HTTP status. Lower layers propagate with `?` and never
//! retry or fall back on their own.

mod types;

pub use types::ExportError;
