use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct PortalMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    navigations: IntCounterVec,
}

impl PortalMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "portal_login_attempts_total",
                "Count of sign-in attempts grouped by portal and outcome",
            ),
            &["portal", "outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let navigations = IntCounterVec::new(
            Opts::new(
                "portal_navigations_total",
                "Count of page navigations grouped by guard outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(navigations.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            navigations,
        })
    }

    pub fn login_attempt(&self, portal: &str, outcome: &str) {
        self.login_attempts
            .with_label_values(&[portal, outcome])
            .inc();
    }

    pub fn navigation(&self, outcome: &str) {
        self.navigations.with_label_values(&[outcome]).inc();
    }

    pub fn login_count(&self, portal: &str, outcome: &str) -> u64 {
        self.login_attempts
            .with_label_values(&[portal, outcome])
            .get()
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
