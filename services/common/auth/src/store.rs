//! Session store: the single owner of "who is signed in".
//!
//! State is published on a `watch` channel so guards and other observers
//! read a consistent [`SessionSnapshot`]. Every change that reaches memory
//! bumps `version`; mutations that awaited the backend are rejected when the
//! version moved underneath them.

use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{AuthBackend, Credentials, Portal, SignupRequest};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::principal::{Principal, ProfileUpdate};
use crate::roles::Role;
use crate::storage::SessionStorage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub principal: Option<Principal>,
    /// True until the boot-time hydration finished.
    pub loading: bool,
    pub version: u64,
}

impl SessionSnapshot {
    pub fn loading() -> Self {
        Self {
            principal: None,
            loading: true,
            version: 0,
        }
    }

    pub fn ready(principal: Option<Principal>) -> Self {
        Self {
            principal,
            loading: false,
            version: 0,
        }
    }

    /// The principal, unless its session has expired. Guards read this.
    pub fn active(&self) -> Option<&Principal> {
        self.principal
            .as_ref()
            .filter(|principal| !principal.is_expired(Utc::now()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.active().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.active().map(|p| p.is_admin).unwrap_or(false)
    }

    pub fn role(&self) -> Option<Role> {
        self.active().map(|p| p.role)
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role().map(|role| role.at_least(required)).unwrap_or(false)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.role().map(|role| role.grants(permission)).unwrap_or(false)
    }
}

pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    backend: Arc<dyn AuthBackend>,
    config: SessionConfig,
    state: watch::Sender<SessionSnapshot>,
    mutation: Mutex<()>,
    sync_task: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        backend: Arc<dyn AuthBackend>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::loading());
        Self {
            storage,
            backend,
            config,
            state,
            mutation: Mutex::new(()),
            sync_task: StdMutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current(&self) -> Option<Principal> {
        self.state.borrow().principal.clone()
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.state.borrow().has_role(required)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.state.borrow().has_permission(permission)
    }

    /// Bearer value for REST collaborators, `None` when the session carries no token.
    pub fn auth_header(&self) -> SessionResult<Option<String>> {
        let state = self.state.borrow();
        let principal = state.principal.as_ref().ok_or(SessionError::NoActiveSession)?;
        if principal.is_expired(Utc::now()) {
            return Err(SessionError::SessionExpired);
        }
        Ok(principal.bearer())
    }

    /// Boot-time load of the persisted principal. Never fails: unreadable,
    /// malformed or expired data all mean "signed out". Always leaves
    /// `loading` false.
    pub fn hydrate(&self) -> SessionSnapshot {
        let persisted = self.read_persisted();
        let restored = persisted.is_some();
        self.state.send_modify(|state| {
            if state.principal != persisted {
                state.principal = persisted;
                state.version += 1;
            }
            state.loading = false;
        });
        debug!(restored, "session hydrated");
        self.snapshot()
    }

    pub async fn login(&self, email: &str, password: &str) -> SessionResult<Principal> {
        self.sign_in(Credentials::new(email, password), Portal::User)
            .await
    }

    pub async fn admin_login(&self, email: &str, password: &str) -> SessionResult<Principal> {
        self.sign_in(Credentials::new(email, password), Portal::Admin)
            .await
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> SessionResult<Principal> {
        let request = SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let _guard = self.mutation.lock().await;
        let started = self.version();
        let mut principal = self
            .bounded(self.backend.register(&request))
            .await
            .inspect_err(|err| warn!(error = %err, "signup failed"))?;
        principal.is_admin = false;

        self.commit(started, Some(principal.clone()))?;
        info!(principal_id = %principal.id, role = %principal.role, "signed up");
        Ok(principal)
    }

    /// Clears the session. Calling it while signed out is a no-op.
    pub async fn logout(&self) -> SessionResult<()> {
        let _guard = self.mutation.lock().await;
        let was_signed_in = self.is_authenticated();
        let persisted = self.persist(None);
        self.publish(None);
        if was_signed_in {
            info!("signed out");
        }
        persisted
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> SessionResult<Principal> {
        let _guard = self.mutation.lock().await;
        let started = self.version();
        let mut principal = self.current().ok_or(SessionError::NoActiveSession)?;
        if principal.is_expired(Utc::now()) {
            return Err(SessionError::SessionExpired);
        }
        principal.apply(update);
        self.commit(started, Some(principal.clone()))?;
        debug!(principal_id = %principal.id, "profile updated");
        Ok(principal)
    }

    /// Follows writes other storage holders make to the session key. Returns
    /// false when the storage has no change feed.
    pub fn start_sync(self: &Arc<Self>) -> bool {
        let Some(mut events) = self.storage.subscribe() else {
            return false;
        };

        let store = Arc::downgrade(self);
        let key = self.config.storage_key.clone();
        let handle = tokio::spawn(async move {
            loop {
                let relevant = match events.recv().await {
                    Ok(event) => event.key == key,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "storage change feed lagged");
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if !relevant {
                    continue;
                }
                match store.upgrade() {
                    Some(store) => store.rehydrate_external(),
                    None => break,
                }
            }
        });

        if let Ok(mut slot) = self.sync_task.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
        true
    }

    /// Stops following storage changes. Safe to call repeatedly.
    pub fn dispose(&self) {
        if let Ok(mut slot) = self.sync_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
                debug!("session sync stopped");
            }
        }
    }

    async fn sign_in(&self, credentials: Credentials, portal: Portal) -> SessionResult<Principal> {
        let _guard = self.mutation.lock().await;
        let started = self.version();
        let mut principal = self
            .bounded(self.backend.authenticate(&credentials, portal))
            .await
            .inspect_err(|err| warn!(portal = portal.as_str(), error = %err, "sign-in failed"))?;
        principal.is_admin = portal == Portal::Admin;

        self.commit(started, Some(principal.clone()))?;
        info!(
            portal = portal.as_str(),
            principal_id = %principal.id,
            role = %principal.role,
            "signed in"
        );
        Ok(principal)
    }

    async fn bounded<F>(&self, call: F) -> SessionResult<Principal>
    where
        F: Future<Output = SessionResult<Principal>>,
    {
        let limit = self.config.request_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| SessionError::Timeout(limit))?
    }

    /// Persists then publishes, unless the session moved since `started`.
    /// A failed write still updates memory and reports `StorageUnavailable`.
    fn commit(&self, started: u64, principal: Option<Principal>) -> SessionResult<()> {
        let found = self.version();
        if found != started {
            warn!(expected = started, found, "discarding stale session write");
            return Err(SessionError::SessionRaceLost {
                expected: started,
                found,
            });
        }
        let persisted = self.persist(principal.as_ref());
        self.publish(principal);
        persisted
    }

    fn publish(&self, principal: Option<Principal>) {
        self.state.send_if_modified(|state| {
            if state.principal == principal && !state.loading {
                return false;
            }
            state.principal = principal;
            state.loading = false;
            state.version += 1;
            true
        });
    }

    fn persist(&self, principal: Option<&Principal>) -> SessionResult<()> {
        let key = &self.config.storage_key;
        let outcome = match principal {
            Some(principal) => principal
                .to_stored()
                .and_then(|raw| self.storage.set(key, &raw)),
            None => self.storage.remove(key),
        };
        if let Err(err) = &outcome {
            warn!(error = %err, "session change kept in memory but not persisted");
        }
        outcome
    }

    fn read_persisted(&self) -> Option<Principal> {
        let key = &self.config.storage_key;
        let raw = match self.storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "session storage unreadable, treating as signed out");
                return None;
            }
        };

        match Principal::from_stored(&raw) {
            Ok(principal) if principal.is_expired(Utc::now()) => {
                info!(principal_id = %principal.id, error = %SessionError::SessionExpired, "dropping persisted session");
                if let Err(err) = self.storage.remove(key) {
                    warn!(error = %err, "failed to remove expired session");
                }
                None
            }
            Ok(principal) => Some(principal),
            Err(err) => {
                warn!(error = %err, "ignoring persisted session");
                None
            }
        }
    }

    fn rehydrate_external(&self) {
        let persisted = self.read_persisted();
        let changed = self.state.send_if_modified(|state| {
            if state.principal == persisted {
                return false;
            }
            state.principal = persisted;
            state.version += 1;
            true
        });
        if changed {
            info!("session replaced by another storage holder");
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.dispose();
    }
}
