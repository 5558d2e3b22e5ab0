// main.rs
use anyhow::{Context, Result};
use log::info;

use exportd::app::init_logger;
use exportd::config::Config;
use exportd::server;
use exportd::storage::init_db_pool;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to read configuration")?;
    init_logger(config.log_format);

    info!(
        "Starting export service (port {}, export cap {:?})",
        config.port, config.export_row_limit
    );

    let pool = init_db_pool(&config.database_url)
        .await
        .context("Failed to initialize database pool")?;

    server::serve(config, pool)
        .await
        .context("Export service terminated abnormally")?;

    info!("Shutdown complete");
    Ok(())
}
