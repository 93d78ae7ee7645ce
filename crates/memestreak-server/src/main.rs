mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use memestreak_api::{AppState, AppStateInner};
use memestreak_db::{Database, RestStore, Store};
use memestreak_gateway::{BotSettings, BroadcastSchedule, Dispatcher, run_broadcast_loop, run_poller};
use memestreak_telegram::{Messenger, TelegramClient};

use crate::config::{Config, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memestreak=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };
    if config.jwt_secret_is_default {
        warn!("JWT_SECRET is not set, falling back to the built-in secret");
    }

    // Store backend
    let store: Arc<dyn Store> = match &config.store {
        StoreConfig::Supabase { url, key } => {
            info!("Using Supabase store at {}", url);
            Arc::new(RestStore::new(url, key)?)
        }
        StoreConfig::Sqlite { path } => Arc::new(Database::open(path)?),
    };

    let client = Arc::new(TelegramClient::new(
        &config.telegram_token,
        config.telegram_api_url.as_deref(),
    )?);
    let messenger: Arc<dyn Messenger> = client.clone();

    // Bot
    let dispatcher = Dispatcher::new(
        store.clone(),
        messenger.clone(),
        BotSettings {
            site_url: config.site_url.clone(),
            session_ttl: config.session_ttl,
        },
    );
    let schedule = BroadcastSchedule {
        initial_delay: config.broadcast_initial_delay,
        interval: config.broadcast_interval,
        ..BroadcastSchedule::default()
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(run_poller(client, dispatcher.clone(), shutdown_rx.clone()));
    let broadcaster = tokio::spawn(run_broadcast_loop(dispatcher, schedule, shutdown_rx));
    info!("🚀 MemeStreak bot running");

    // Website API
    let app_state: AppState = Arc::new(AppStateInner::new(
        store,
        messenger,
        config.jwt_secret.clone(),
        config.otp_ttl,
    ));
    let app = memestreak_api::router(app_state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("🌐 API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(poller, broadcaster);
    info!("MemeStreak stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
