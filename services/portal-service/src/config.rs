use anyhow::{anyhow, Context, Result};
use leadtree_auth::{RoutePaths, SessionConfig, DEFAULT_STORAGE_KEY};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// The portal holds a single session, so it only listens on loopback unless
/// told otherwise.
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8090;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Directory for file-backed session storage; in-memory when unset.
    pub session_dir: Option<PathBuf>,
    pub session_key: String,
    /// Authentication backend base URL; simulated authentication when unset.
    pub auth_url: Option<String>,
    pub request_timeout: Duration,
    pub mock_latency: Duration,
    pub allowed_origins: Vec<String>,
}

impl PortalConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn paths(&self) -> RoutePaths {
        RoutePaths::default()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_storage_key(self.session_key.clone())
            .with_request_timeout(self.request_timeout)
            .with_paths(self.paths())
    }
}

pub fn load_portal_config() -> Result<PortalConfig> {
    portal_config_from(|key| env::var(key).ok())
}

pub fn portal_config_from<F>(lookup: F) -> Result<PortalConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("HOST")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
        .parse::<IpAddr>()
        .context("Failed to parse HOST")?;

    let port = match lookup("PORT").and_then(|value| normalize_optional(&value)) {
        Some(value) => value
            .parse::<u16>()
            .map_err(|err| anyhow!("Invalid PORT '{value}': {err}"))?,
        None => DEFAULT_PORT,
    };

    let session_dir = lookup("PORTAL_SESSION_DIR")
        .and_then(|value| normalize_optional(&value))
        .map(PathBuf::from);

    let session_key = lookup("PORTAL_SESSION_KEY")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());

    let auth_url = lookup("PORTAL_AUTH_URL").and_then(|value| normalize_optional(&value));

    let request_timeout = millis_from(&lookup, "PORTAL_REQUEST_TIMEOUT_MS")?
        .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
    if request_timeout.is_zero() {
        return Err(anyhow!("PORTAL_REQUEST_TIMEOUT_MS must be greater than zero"));
    }

    let mock_latency = millis_from(&lookup, "PORTAL_MOCK_LATENCY_MS")?.unwrap_or(Duration::ZERO);

    let allowed_origins = lookup("PORTAL_ALLOWED_ORIGINS")
        .map(|value| parse_list(&value))
        .unwrap_or_else(default_origins);

    Ok(PortalConfig {
        host,
        port,
        session_dir,
        session_key,
        auth_url,
        request_timeout,
        mock_latency,
        allowed_origins,
    })
}

fn millis_from<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| normalize_optional(&value))
        .map(|value| {
            value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|err| anyhow!("Invalid {key} '{value}': {err}"))
        })
        .transpose()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
