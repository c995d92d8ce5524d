use std::time::Duration;

pub const DEFAULT_STORAGE_KEY: &str = "leadtree_user";

/// Sign-in and landing paths the guards redirect to. Opaque to the guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePaths {
    pub login: String,
    pub admin_login: String,
    pub dashboard: String,
    pub admin_dashboard: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            admin_login: "/admin/login".to_string(),
            dashboard: "/dashboard".to_string(),
            admin_dashboard: "/admin/dashboard".to_string(),
        }
    }
}

/// Runtime configuration for the session store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Storage key holding the serialized principal.
    pub storage_key: String,
    /// Upper bound on a single backend call.
    pub request_timeout: Duration,
    pub paths: RoutePaths,
}

impl SessionConfig {
    /// Defaults: `leadtree_user` key, 10 second backend timeout.
    pub fn new() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            request_timeout: Duration::from_secs(10),
            paths: RoutePaths::default(),
        }
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_paths(mut self, paths: RoutePaths) -> Self {
        self.paths = paths;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
