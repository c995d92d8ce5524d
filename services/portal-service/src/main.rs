use std::sync::Arc;

use anyhow::{Context, Result};
use leadtree_auth::{
    AuthBackend, FileStorage, HttpAuthBackend, MemoryStorage, MockBackend, RouteTable,
    SessionStorage, SessionStore,
};
use portal_service::app::cors_layer;
use portal_service::config::load_portal_config;
use portal_service::metrics::PortalMetrics;
use portal_service::routes::leadtree_route_tables;
use portal_service::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_portal_config()?;

    let storage: Arc<dyn SessionStorage> = match &config.session_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using file session storage");
            Arc::new(FileStorage::new(dir.clone()))
        }
        None => Arc::new(MemoryStorage::new()),
    };

    let backend: Arc<dyn AuthBackend> = match &config.auth_url {
        Some(url) => Arc::new(HttpAuthBackend::new(url.clone())),
        None => {
            warn!("PORTAL_AUTH_URL not set; accepting any non-blank credentials");
            Arc::new(MockBackend::permissive().with_latency(config.mock_latency))
        }
    };

    let paths = config.paths();
    let routes = RouteTable::compose(leadtree_route_tables(&paths), paths)
        .context("Failed to compose route table")?;

    let session = Arc::new(SessionStore::new(storage, backend, config.session_config()));
    session.start_sync();
    let hydrating = session.clone();
    let restored = tokio::task::spawn_blocking(move || hydrating.hydrate())
        .await
        .context("Session hydration task failed")?;
    info!(
        authenticated = restored.is_authenticated(),
        "session restored"
    );

    let metrics = PortalMetrics::new()?;
    let state = AppState::new(session.clone(), routes, metrics);
    let app = build_router(state).layer(cors_layer(&config.allowed_origins)?);

    let addr = config.addr();
    info!(%addr, "starting portal-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.dispose();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
