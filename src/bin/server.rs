//! canslim-sentry server: headless surveillance service, no UI, no
//! inbound HTTP. Alerts go out over Discord webhooks; status/control
//! comes in over the local IPC socket (spec §4.7).
//!
//! # Environment Variables
//! - `CONFIG_PATH` - path to the YAML config document (default: `config.yaml`)
//! - `DATABASE_URL`, `IPC_SOCKET_PATH`, `DISCORD_DEFAULT_WEBHOOK` - see `Config::apply_env_overrides`
//! - `IBKR_HOST`, `IBKR_PORT`, `MARKET_DATA_API_KEY`, ... - provider credentials (see `config::provider_env_config`)

use anyhow::Result;
use canslim_sentry::application::system::Application;
use canslim_sentry::config::Config;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let default_level: Level = config.logging.console_level.parse().unwrap_or(Level::INFO);
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()))
        .with(stdout_layer)
        .init();

    info!("canslim-sentry {} starting...", env!("CARGO_PKG_VERSION"));
    info!(socket = %config.ipc_socket_path, db = %config.database_url, "configuration loaded");

    info!("building application...");
    let app = Application::build(config).await?;

    info!("starting workers and ipc acceptor...");
    let handle = app.start().await?;
    info!("canslim-sentry running. Press Ctrl+C to shut down.");

    let cancellation = handle.cancellation_token();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received (ctrl-c)");
        }
        _ = cancellation.cancelled() => {
            info!("shutdown requested over ipc");
        }
    }

    handle.shutdown().await;
    info!("canslim-sentry stopped.");
    Ok(())
}
