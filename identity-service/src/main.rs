use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use admission_core::error::AppError;
use admission_core::limit::spawn_sweeper;
use admission_core::observability::{init_metrics, init_tracing};
use admission_core::revoke::{InMemoryRevocationStore, RedisRevocationStore, RevocationStore};
use identity_service::{
    build_router,
    config::{IdentityConfig, ProviderMode},
    provider::{CodeExchangeClient, IdentityProvider, StaticProvider},
    store::{AccountStore, InMemoryAccountStore, PgAccountStore},
    AppState,
};
use secrecy::ExposeSecret;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(&config.log_level);
    init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    // Account store: Postgres when configured, otherwise process memory.
    let accounts: Arc<dyn AccountStore> = match &config.store.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres account store");
            let store = PgAccountStore::connect(
                url.expose_secret(),
                config.store.max_connections,
                config.store.min_connections,
            )
            .await?;
            store.run_migrations().await?;
            tracing::info!("Account store migrations applied");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, accounts will not survive restarts");
            Arc::new(InMemoryAccountStore::new())
        }
    };

    // Revocation marks: Redis when configured, so logout holds across
    // instances; otherwise process memory.
    let revocations: Arc<dyn RevocationStore> = match &config.store.redis_url {
        Some(url) => {
            let store = RedisRevocationStore::connect(url.expose_secret())
                .await
                .map_err(AppError::StorageError)?;
            tracing::info!("Redis revocation store initialized");
            Arc::new(store)
        }
        None => {
            tracing::warn!("REDIS_URL not set, revocations are per-instance only");
            Arc::new(InMemoryRevocationStore::new())
        }
    };

    let provider: Arc<dyn IdentityProvider> = match config.provider.mode {
        ProviderMode::Http => {
            tracing::info!(base_url = %config.provider.base_url, "Using HTTP identity provider");
            Arc::new(CodeExchangeClient::new(config.provider.clone())?)
        }
        ProviderMode::Static => {
            tracing::warn!("Using static identity provider, login codes resolve to themselves");
            Arc::new(StaticProvider::passthrough())
        }
    };

    let state = AppState::new(config.clone(), provider, accounts, revocations)?;

    spawn_sweeper(
        state.limiter.clone(),
        Duration::from_secs(config.edge.sweep_interval_seconds),
    );
    tracing::info!(
        interval_seconds = config.edge.sweep_interval_seconds,
        "Rate limiter sweeper started"
    );

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    // Give in-flight requests time to complete
    tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
}
