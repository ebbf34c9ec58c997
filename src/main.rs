use std::sync::Arc;

use anyhow::Context;
use lostnfound_api::config::Config;
use lostnfound_api::db::{create_pool, run_migrations};
use lostnfound_api::repository::{PgImageRepository, PgItemRepository};
use lostnfound_api::router::{build_router, AppState};
use lostnfound_api::services::{ItemService, StorageService};
use lostnfound_api::storage::GcsBackend;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "lostnfound_api={lvl},tower_http={lvl}",
                    lvl = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting lostnfound-api ({} environment)...",
        config.environment
    );
    tracing::info!("Connecting to database...");

    let pool = create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!("Database connection established");

    tracing::info!("GCS storage: bucket={}", config.gcs_bucket);
    let store = GcsBackend::new(
        config.gcs_bucket.clone(),
        config.gcs_project_id.clone(),
        config.gcs_credentials_file.as_deref(),
    )
    .await
    .context("failed to create GCS client")?;

    if config.redis_url.is_some() {
        tracing::info!("REDIS_URL is set but no cache is configured; ignoring");
    }

    let items = ItemService::new(Arc::new(PgItemRepository::new(pool.clone())));
    let storage = StorageService::new(
        Arc::new(store),
        Arc::new(PgImageRepository::new(pool.clone())),
    );
    let state = AppState::new(items, storage, config.jwt.secret.as_str());
    let app = build_router(state);

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
