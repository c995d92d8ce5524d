use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::principal::{Principal, Subscription};
use crate::roles::Role;

/// Which sign-in surface a login came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Portal {
    User,
    Admin,
}

impl Portal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Portal::User => "user",
            Portal::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.email.trim().is_empty() || self.password.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Source of truth for identities. Role and admin standing always come from
/// here, never from the caller.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials, portal: Portal)
        -> SessionResult<Principal>;

    async fn register(&self, request: &SignupRequest) -> SessionResult<Principal>;
}

#[derive(Debug, Clone)]
struct MockAccount {
    name: String,
    password: String,
    role: Role,
}

/// Simulated backend. In permissive mode any non-blank credentials sign in,
/// as a `client` through the user portal and as a `super_admin` through the
/// admin portal. Registered accounts are always checked for real.
pub struct MockBackend {
    accounts: RwLock<HashMap<String, MockAccount>>,
    permissive: bool,
    latency: Duration,
    session_ttl: Option<chrono::Duration>,
}

impl MockBackend {
    pub fn permissive() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            permissive: true,
            latency: Duration::ZERO,
            session_ttl: None,
        }
    }

    /// Only registered accounts can sign in.
    pub fn strict() -> Self {
        Self {
            permissive: false,
            ..Self::permissive()
        }
    }

    pub fn with_account(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
        role: Role,
    ) -> Self {
        if let Ok(mut guard) = self.accounts.write() {
            guard.insert(
                normalize_email(&email.into()),
                MockAccount {
                    name: name.into(),
                    password: password.into(),
                    role,
                },
            );
        }
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn issue(&self, email: &str, name: String, role: Role, portal: Portal) -> Principal {
        let subscription = match portal {
            Portal::User => Subscription::starter(),
            Portal::Admin => Subscription {
                plan: "enterprise".to_string(),
                leads_used: 0,
                leads_limit: 100_000,
            },
        };
        Principal {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            name,
            role,
            is_admin: portal == Portal::Admin,
            subscription,
            token: Some(format!("mock-{}", Uuid::new_v4().simple())),
            expires_at: self.session_ttl.map(|ttl| Utc::now() + ttl),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::permissive()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn display_name(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or("LeadTree user")
        .to_string()
}

fn lock_failed<T>(_: T) -> SessionError {
    SessionError::Network("mock account registry unavailable".to_string())
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn authenticate(
        &self,
        credentials: &Credentials,
        portal: Portal,
    ) -> SessionResult<Principal> {
        self.simulate_latency().await;
        if credentials.is_blank() {
            return Err(SessionError::InvalidCredentials);
        }

        let key = normalize_email(&credentials.email);
        let account = self.accounts.read().map_err(lock_failed)?.get(&key).cloned();

        let (name, role) = match account {
            Some(account) => {
                if account.password != credentials.password {
                    return Err(SessionError::InvalidCredentials);
                }
                if portal == Portal::Admin && !account.role.at_least(Role::Admin) {
                    return Err(SessionError::InvalidCredentials);
                }
                (account.name, account.role)
            }
            None if self.permissive => {
                let role = match portal {
                    Portal::User => Role::Client,
                    Portal::Admin => Role::SuperAdmin,
                };
                (display_name(&credentials.email), role)
            }
            None => return Err(SessionError::InvalidCredentials),
        };

        debug!(portal = portal.as_str(), role = %role, "mock backend authenticated");
        Ok(self.issue(&credentials.email, name, role, portal))
    }

    async fn register(&self, request: &SignupRequest) -> SessionResult<Principal> {
        self.simulate_latency().await;
        if request.name.trim().is_empty()
            || request.email.trim().is_empty()
            || request.password.is_empty()
        {
            return Err(SessionError::InvalidCredentials);
        }

        let key = normalize_email(&request.email);
        {
            let mut guard = self.accounts.write().map_err(lock_failed)?;
            if guard.contains_key(&key) {
                return Err(SessionError::AccountExists(request.email.trim().to_string()));
            }
            guard.insert(
                key,
                MockAccount {
                    name: request.name.clone(),
                    password: request.password.clone(),
                    role: Role::Client,
                },
            );
        }

        Ok(self.issue(&request.email, request.name.clone(), Role::Client, Portal::User))
    }
}

/// REST-backed authentication.
///
/// `POST {base}/auth/login`, `POST {base}/auth/admin/login` and
/// `POST {base}/auth/signup`, each answering `{ user, token?, expiresAt? }`.
#[derive(Clone)]
pub struct HttpAuthBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendSession {
    user: BackendUser,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BackendUser {
    id: String,
    email: String,
    name: String,
    role: Role,
    #[serde(default)]
    subscription: Option<Subscription>,
}

impl HttpAuthBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        email: &str,
        portal: Portal,
    ) -> SessionResult<Principal> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| SessionError::Network(err.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SessionError::InvalidCredentials)
            }
            StatusCode::CONFLICT => return Err(SessionError::AccountExists(email.to_string())),
            status if !status.is_success() => {
                return Err(SessionError::Network(format!("HTTP {status} from {url}")))
            }
            _ => {}
        }

        let session: BackendSession = response
            .json()
            .await
            .map_err(|err| SessionError::Network(format!("invalid auth response: {err}")))?;

        let BackendSession {
            user,
            token,
            expires_at,
        } = session;

        Ok(Principal {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            is_admin: portal == Portal::Admin,
            subscription: user.subscription.unwrap_or_default(),
            token,
            expires_at,
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn authenticate(
        &self,
        credentials: &Credentials,
        portal: Portal,
    ) -> SessionResult<Principal> {
        let path = match portal {
            Portal::User => "/auth/login",
            Portal::Admin => "/auth/admin/login",
        };
        self.post(path, credentials, &credentials.email, portal).await
    }

    async fn register(&self, request: &SignupRequest) -> SessionResult<Principal> {
        self.post("/auth/signup", request, &request.email, Portal::User)
            .await
    }
}
