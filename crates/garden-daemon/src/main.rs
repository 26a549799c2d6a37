mod http;
mod mpv;

use garden_core::{
    Config, DirectoryClient, PlaybackCoordinator, PreferenceStore, StationCache,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup file logging
    let data_dir = garden_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,garden_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let cache = StationCache::new();
    let directory = DirectoryClient::new(config.directory.clone(), cache.clone())?;
    let prefs = Arc::new(PreferenceStore::open(config.prefs.settings_file.clone()).await);
    let controller = mpv::MpvSession::new();

    let coordinator = Arc::new(PlaybackCoordinator::new(
        directory,
        cache,
        prefs,
        controller,
    ));

    // Attach the player and restore the last session; playback stays degraded
    // (browse-only) if mpv is unavailable.
    coordinator.init().await;

    // Populate the default browsing view up front.
    coordinator.fetch_stations("").await;

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            coordinator.clone(),
        );
    }

    info!("Daemon initialised");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
