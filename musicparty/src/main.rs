mod http;
mod state;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use musicparty_core::config::ProvidersConfig;
use musicparty_core::logging;
use musicparty_core::provider::{ApiRegistry, BilibiliApi, NeteaseApi, QqMusicApi};
use musicparty_core::service::PartyHub;
use musicparty_core::Config;
use musicparty_providers::{BilibiliClient, NeteaseClient, QqMusicClient};

use state::{AppState, SessionStore};

#[derive(Parser)]
#[command(name = "musicparty", about = "Shared listening-party server")]
struct Args {
    /// Path to the configuration file (defaults to ./musicparty.toml)
    #[arg(short, long, env = "MUSICPARTY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(args.config.as_deref())?;

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        anyhow::bail!("Configuration validation failed with {} error(s)", errors.len());
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("MusicParty server starting...");

    // 4. Build catalog adapters from config
    let registry = Arc::new(build_registry(&config.providers));
    info!(apis = ?registry.names(), "music catalogs enabled");

    // 5. Create the party hub
    let hub = Arc::new(PartyHub::new(
        Arc::clone(&registry),
        Duration::from_secs(config.resolve.timeout_seconds),
    ));

    // 6. Start the HTTP/WebSocket server
    let app_state = AppState {
        hub,
        apis: registry,
        sessions: Arc::new(SessionStore::new()),
    };
    let app = http::router(app_state);
    let listener = tokio::net::TcpListener::bind(config.http_address()).await?;
    info!("HTTP address: {}", config.http_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("MusicParty server stopped");
    Ok(())
}

/// Construct one adapter per configured provider section.
fn build_registry(providers: &ProvidersConfig) -> ApiRegistry {
    let mut registry = ApiRegistry::new();

    if let Some(cfg) = &providers.netease {
        let client = NeteaseClient::new(cfg.base_url.trim_end_matches('/'), cfg.cookie.clone());
        registry.register(Arc::new(NeteaseApi::new(client)));
    }
    if let Some(cfg) = &providers.qqmusic {
        let client = QqMusicClient::new(cfg.base_url.trim_end_matches('/'), cfg.cookie.clone());
        registry.register(Arc::new(QqMusicApi::new(client)));
    }
    if let Some(cfg) = &providers.bilibili {
        let client = BilibiliClient::new(cfg.cookie.clone());
        registry.register(Arc::new(BilibiliApi::new(client)));
    }

    registry
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!("failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
