mod catalog;
mod logs;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use nrbroadcast::{
    BroadcastConfigExt, BroadcastServices, BroadcastSinkFactory, Broadcaster, FileAudioProvider,
    LiveRegistries,
};
use nrconfig::{Config, get_config};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional first argument: configuration directory
    let config = match std::env::args().nth(1) {
        Some(dir) => Arc::new(Config::load_config(&dir)?),
        None => get_config(),
    };

    let log = logs::init_logging(&config)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = config.directory(),
        level = %log.max_level(),
        "Starting NetRadio"
    );

    let settings = config.get_broadcast_settings()?;
    let media_dir = config.get_media_dir()?;
    let catalog_file = config.get_catalog_file()?;

    let catalog = Arc::new(catalog::load_catalog(Path::new(&catalog_file))?);

    let services = BroadcastServices {
        catalog: catalog.clone(),
        schedule: catalog,
        audio: Arc::new(FileAudioProvider::new(&media_dir)),
        sinks: Arc::new(BroadcastSinkFactory::new(settings.sink_capacity)),
    };

    let broadcaster = Broadcaster::start_all(services, settings, LiveRegistries::new())
        .await
        .context("broadcast startup failed")?;

    info!(
        channels = broadcaster.channel_ids().len(),
        media_dir = %media_dir,
        "NetRadio running, press Ctrl+C to stop"
    );

    shutdown_signal().await;

    broadcaster.shutdown().await;
    info!("NetRadio stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
