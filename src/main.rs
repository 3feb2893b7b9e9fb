//! Library Server
//!
//! REST API for books, borrowers and borrowing processes.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_server::{
    api,
    config::{AppConfig, CounterBackend, StoreBackend},
    repository::{MemoryStore, PgStore},
    services::{
        clock::{Clock, SystemClock},
        rate_limit::{MemoryCounter, RequestCounter},
        redis::RedisCounter,
        Services,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    init_tracing(&config);

    tracing::info!("Starting Library Server v{}", env!("CARGO_PKG_VERSION"));

    let counter: Arc<dyn RequestCounter> = match config.rate_limit.backend {
        CounterBackend::Memory => Arc::new(MemoryCounter::new()),
        CounterBackend::Redis => {
            let counter = RedisCounter::new(&config.rate_limit.redis_url).await?;
            tracing::info!("Connected to Redis");
            Arc::new(counter)
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let services = match config.database.backend {
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config.database).await?;
            tracing::info!("Connected to database");

            store.migrate().await?;
            tracing::info!("Database migrations completed");

            Services::new(Arc::new(store), &config, counter, clock)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-process store, data is lost on shutdown");
            Services::new(Arc::new(MemoryStore::new()), &config, counter, clock)
        }
    };

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("library_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
