//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::env;

use axum::{
    Router, http,
    http::{Method, header},
};
use ledger::presentation::extract::OWNER_HEADER;
use ledger::{InMemoryLedgerStore, LedgerConfig, PgLedgerStore, ledger_router, ledger_router_generic};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,ledger=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LedgerConfig::from_env()?;

    let ledger = match config.database_url.as_deref() {
        Some(database_url) => {
            let store = PgLedgerStore::connect(database_url, &config).await?;

            // Run migrations
            sqlx::migrate!("../../../database/migrations")
                .run(store.pool())
                .await?;

            tracing::info!("Migrations completed");

            ledger_router(store, &config)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory ledger store");
            ledger_router_generic(InMemoryLedgerStore::new(config.lock_wait_timeout), &config)
        }
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            http::HeaderName::from_static(OWNER_HEADER),
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api", ledger)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!(
        addr = %config.bind_addr,
        tx_timeout_ms = config.tx_timeout_ms(),
        "Listening on {}",
        config.bind_addr
    );

    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
