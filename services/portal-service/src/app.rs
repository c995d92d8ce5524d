use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method, StatusCode,
};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use leadtree_auth::{RouteTable, SessionStore};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::error;

use crate::access_handlers::{check_permission, check_roles, navigate_page};
use crate::metrics::PortalMetrics;
use crate::session_handlers::{
    admin_login, current_session, login, logout, signup, update_profile,
};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionStore>,
    pub routes: Arc<RouteTable>,
    pub metrics: Arc<PortalMetrics>,
}

impl AppState {
    pub fn new(session: Arc<SessionStore>, routes: RouteTable, metrics: PortalMetrics) -> Self {
        Self {
            session,
            routes: Arc::new(routes),
            metrics: Arc::new(metrics),
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/session", get(current_session))
        .route("/api/session/login", post(login))
        .route("/api/session/admin-login", post(admin_login))
        .route("/api/session/signup", post(signup))
        .route("/api/session/logout", post(logout))
        .route("/api/session/profile", axum::routing::patch(update_profile))
        .route("/api/access/roles", get(check_roles))
        .route("/api/access/permissions/:permission", get(check_permission))
        .fallback(navigate_page)
        .with_state(state)
}

pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]))
}
