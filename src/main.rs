use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vfarm_dashboard::config::Config;
use vfarm_dashboard::dashboard::{Fetcher, Poller, PollerSettings};
use vfarm_dashboard::db::Repository;
use vfarm_dashboard::routes::build_router;
use vfarm_dashboard::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vfarm_dashboard=debug,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Vertical farm dashboard starting...");

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let config = Config::load(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {}\n\n\
             Make sure:\n\
             1. {} exists (or set CONFIG_PATH)\n\
             2. All required environment variables are set (check .env.example)\n\
             3. Create a .env file if needed",
            e,
            config_path
        )
    })?;
    info!("Configuration loaded from {}", config_path);

    let offset = config.dashboard.display_offset()?;

    let max_connections = config.database.max_connections;
    let sensors = open_pool(&config.database.sensor_path, max_connections).await?;
    let predictions = open_pool(&config.database.prediction_path, max_connections).await?;
    let users = open_pool(&config.database.users_path, max_connections).await?;

    // Create repository and run migrations
    let repository = Arc::new(Repository::new(sensors, predictions, users));
    repository.run_migrations().await?;
    repository.ensure_source_tables().await?;

    // Set up shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let fetcher = Arc::new(Fetcher::new(
        &config.dashboard.api_base_url,
        config.dashboard.request_timeout(),
        config.dashboard.max_retries,
    )?);
    let settings = PollerSettings {
        refresh_interval: config.dashboard.refresh_interval(),
        initial_delay: Duration::from_secs(config.dashboard.initial_delay_seconds),
        offset,
    };
    let (mut poller, handle) = Poller::new(fetcher, settings, shutdown_rx.clone());
    let poller_task = tokio::spawn(async move { poller.run().await });

    let bind_address = config.server.bind_address();
    let app = build_router(AppState::new(repository, config, handle));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", bind_address, e))?;
    info!("Listening on {}", bind_address);

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
        })
        .await?;

    if let Err(e) = poller_task.await {
        error!("Poller task failed: {}", e);
    }

    info!("Vertical farm dashboard shutting down");
    Ok(())
}

async fn open_pool(path: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open SQLite database: {}\n\n\
                 Path: {}\n\n\
                 Common fixes:\n\
                 1. Check the path in config/config.yaml (SENSOR_DB, PREDICTION_DB, USERS_DB)\n\
                 2. Make sure the parent directory exists and is writable",
                e,
                path
            )
        })?;

    info!("Opened SQLite database: {}", path);
    Ok(pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
