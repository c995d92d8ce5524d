#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method, Request, Response,
};
use axum::Router;
use http_body_util::BodyExt;
use leadtree_auth::{
    MemoryStorage, MockBackend, Role, RoutePaths, RouteTable, SessionConfig, SessionStore,
};
use portal_service::metrics::PortalMetrics;
use portal_service::routes::leadtree_route_tables;
use portal_service::{build_router, AppState};
use serde_json::Value;
use tower::util::ServiceExt;

pub struct TestPortal {
    pub app: Router,
    pub session: Arc<SessionStore>,
    pub storage: MemoryStorage,
    pub metrics: Arc<PortalMetrics>,
}

impl TestPortal {
    /// Portal whose session has already been hydrated from empty storage.
    pub fn ready(backend: MockBackend) -> Result<Self> {
        let portal = Self::loading(backend)?;
        portal.session.hydrate();
        Ok(portal)
    }

    /// Portal whose session has not been hydrated yet.
    pub fn loading(backend: MockBackend) -> Result<Self> {
        let storage = MemoryStorage::new();
        let session = Arc::new(SessionStore::new(
            Arc::new(storage.clone()),
            Arc::new(backend),
            SessionConfig::new(),
        ));
        let paths = RoutePaths::default();
        let routes = RouteTable::compose(leadtree_route_tables(&paths), paths)
            .context("compose route table")?;
        let state = AppState::new(session.clone(), routes, PortalMetrics::new()?);
        let metrics = state.metrics.clone();
        Ok(Self {
            app: build_router(state),
            session,
            storage,
            metrics,
        })
    }

    pub async fn get(&self, uri: &str) -> Result<Response<Body>> {
        self.send(Method::GET, uri, None).await
    }

    pub async fn get_as(&self, uri: &str, token: Option<&str>) -> Result<Response<Body>> {
        self.send_as(Method::GET, uri, None, token).await
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Result<Response<Body>> {
        self.send_as(method, uri, body, None).await
    }

    pub async fn send_as(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<Response<Body>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        Ok(self.app.clone().oneshot(request).await?)
    }
}

pub fn accounts() -> MockBackend {
    MockBackend::strict()
        .with_account("client@leadtree.io", "client-pass", "Casey Client", Role::Client)
        .with_account("team@leadtree.io", "team-pass", "Tess Team", Role::TeamMember)
        .with_account("admin@leadtree.io", "admin-pass", "Ada Admin", Role::Admin)
        .with_account("root@leadtree.io", "root-pass", "Sam Super", Role::SuperAdmin)
}

pub async fn json_body(response: Response<Body>) -> Result<Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
}
