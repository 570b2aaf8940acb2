//! Arena game server.

use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,server=debug")),
        )
        .init();

    info!("Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  World: {0}x{0}", config.world.size);
    info!(
        "  Tick: {}Hz, snapshots: {}Hz, heartbeat: {}s",
        config.server.tick_rate_hz,
        config.server.snapshot_rate_hz,
        config.server.heartbeat_interval_secs
    );

    server::run(config).await
}
