//! leetbot - multi-server IRC bot.

use std::time::Duration;

use leetbot::config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(path = %config_path, name = %config.bot.name, "Loaded configuration");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(leetbot::run(config));
    // The stdin reader parks a blocking thread until the next line arrives.
    runtime.shutdown_timeout(Duration::from_secs(1));

    result.map_err(|e| {
        error!(error = %e, "Startup failed");
        e.into()
    })
}
