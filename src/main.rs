use std::sync::Arc;

use glyph_relay::auth::JwtVerifier;
use glyph_relay::config::RelayConfig;
use glyph_relay::registry::ConnectionRegistry;
use glyph_relay::store::{MemoryShapeStore, PgShapeStore, ShapeStore};
use glyph_relay::{db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env file loaded");
    }
    let config = RelayConfig::from_env()?;

    // Without a database the relay still runs; shapes just don't survive a restart.
    let store: Arc<dyn ShapeStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections).await?;
            tracing::info!(max_connections = config.db_max_connections, "shape store: postgres");
            Arc::new(PgShapeStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; shapes are kept in memory only");
            Arc::new(MemoryShapeStore::new())
        }
    };

    let state = state::AppState::new(ConnectionRegistry::new(), store, Arc::new(JwtVerifier::new(&config.jwt_secret)));

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    tracing::info!(port = config.port, "glyph relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
