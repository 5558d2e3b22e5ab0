//! Application-level concerns: logging and graceful shutdown.

pub mod logging;
pub mod shutdown;

pub use logging::init_logger;
pub use shutdown::shutdown_signal;
