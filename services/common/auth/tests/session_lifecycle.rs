use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use leadtree_auth::{
    AuthenticatedGuard, GuardDecision, MemoryStorage, MockBackend, Principal, ProfileUpdate, Role,
    SessionConfig, SessionError, SessionResult, SessionStorage, SessionStore, DEFAULT_STORAGE_KEY,
};

/// Memory storage whose writes can be switched off, like a browser with
/// storage disabled.
#[derive(Clone, Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    broken: Arc<AtomicBool>,
}

impl FlakyStorage {
    fn break_writes(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> SessionResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(SessionError::StorageUnavailable("quota exceeded".into()))
        } else {
            Ok(())
        }
    }
}

impl SessionStorage for FlakyStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.check()?;
        self.inner.remove(key)
    }
}

fn store(storage: impl SessionStorage + 'static, backend: MockBackend) -> Arc<SessionStore> {
    Arc::new(SessionStore::new(
        Arc::new(storage),
        Arc::new(backend),
        SessionConfig::new(),
    ))
}

fn stored(storage: &MemoryStorage) -> Option<Principal> {
    storage
        .get(DEFAULT_STORAGE_KEY)
        .unwrap()
        .map(|raw| Principal::from_stored(&raw).unwrap())
}

#[tokio::test]
async fn logout_after_any_sequence_clears_memory_and_storage() {
    let storage = MemoryStorage::new();
    let store = store(storage.clone(), MockBackend::permissive());
    store.hydrate();

    store.login("a@example.com", "pw").await.unwrap();
    store
        .update_profile(ProfileUpdate {
            name: Some("Renamed".into()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap();
    store.admin_login("a@example.com", "pw").await.unwrap();
    assert!(stored(&storage).is_some());

    store.logout().await.unwrap();
    let once = store.snapshot();
    assert!(!once.is_authenticated());
    assert!(!storage.contains(DEFAULT_STORAGE_KEY));

    store.logout().await.unwrap();
    assert_eq!(store.snapshot(), once);
    assert!(!storage.contains(DEFAULT_STORAGE_KEY));
}

#[tokio::test]
async fn hydrate_returns_exactly_what_was_persisted() {
    let storage = MemoryStorage::new();
    let first = store(storage.clone(), MockBackend::permissive());
    first.hydrate();
    let principal = first.signup("Grace", "grace@example.com", "pw").await.unwrap();
    assert_eq!(principal.role, Role::Client);
    drop(first);

    let reloaded = store(storage.clone(), MockBackend::permissive());
    let snapshot = reloaded.hydrate();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.principal, Some(principal));
}

#[tokio::test]
async fn update_profile_merges_and_repersists() {
    let storage = MemoryStorage::new();
    let store = store(storage.clone(), MockBackend::permissive());
    store.hydrate();
    let before = store.login("a@example.com", "pw").await.unwrap();

    let after = store
        .update_profile(ProfileUpdate {
            email: Some("new@example.com".into()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap();

    assert_eq!(after.email, "new@example.com");
    assert_eq!(after.name, before.name);
    assert_eq!(after.role, before.role);
    assert_eq!(stored(&storage), Some(after));
}

#[tokio::test]
async fn invalid_credentials_leave_session_untouched() {
    let storage = MemoryStorage::new();
    let backend = MockBackend::strict().with_account("a@example.com", "right", "A", Role::TeamMember);
    let store = store(storage.clone(), backend);
    store.hydrate();

    let err = store.login("a@example.com", "wrong").await.unwrap_err();
    assert_eq!(err, SessionError::InvalidCredentials);
    assert!(!store.is_authenticated());
    assert!(!storage.contains(DEFAULT_STORAGE_KEY));
}

#[tokio::test]
async fn storage_failure_keeps_session_in_memory_and_reports_it() {
    let storage = FlakyStorage::default();
    let store = store(storage.clone(), MockBackend::permissive());
    store.hydrate();
    storage.break_writes();

    let err = store.login("a@example.com", "pw").await.unwrap_err();
    assert!(matches!(err, SessionError::StorageUnavailable(_)));
    assert!(store.is_authenticated(), "session stays valid in memory");
}

#[tokio::test]
async fn unreadable_storage_hydrates_signed_out() {
    let storage = FlakyStorage::default();
    storage.break_writes();
    let store = store(storage, MockBackend::permissive());
    let snapshot = store.hydrate();
    assert!(!snapshot.loading);
    assert!(!snapshot.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn slow_backend_maps_to_timeout() {
    let storage = MemoryStorage::new();
    let store = Arc::new(SessionStore::new(
        Arc::new(storage.clone()),
        Arc::new(MockBackend::permissive().with_latency(Duration::from_secs(30))),
        SessionConfig::new().with_request_timeout(Duration::from_millis(100)),
    ));
    store.hydrate();

    let err = store.login("a@example.com", "pw").await.unwrap_err();
    assert_eq!(err, SessionError::Timeout(Duration::from_millis(100)));
    assert!(!store.is_authenticated());
    assert!(!storage.contains(DEFAULT_STORAGE_KEY));
}

#[tokio::test(start_paused = true)]
async fn concurrent_mutations_are_serialized() {
    let store = Arc::new(SessionStore::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(MockBackend::permissive().with_latency(Duration::from_millis(50))),
        SessionConfig::new(),
    ));
    store.hydrate();

    let login = {
        let store = store.clone();
        tokio::spawn(async move { store.login("a@example.com", "pw").await })
    };
    tokio::task::yield_now().await;
    let logout = {
        let store = store.clone();
        tokio::spawn(async move { store.logout().await })
    };

    login.await.unwrap().unwrap();
    logout.await.unwrap().unwrap();
    assert!(
        !store.is_authenticated(),
        "logout queued behind login must win, not be overwritten"
    );
}

#[tokio::test]
async fn other_tab_writes_rehydrate_this_tab() {
    let shared = MemoryStorage::new();
    let tab_a = store(shared.clone(), MockBackend::permissive());
    let tab_b = store(shared.clone(), MockBackend::permissive());
    tab_a.hydrate();
    tab_b.hydrate();
    assert!(tab_a.start_sync());

    let mut changes = tab_a.subscribe();
    let principal = tab_b.login("b@example.com", "pw").await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), changes.wait_for(|s| s.is_authenticated()))
        .await
        .expect("tab a saw the login")
        .unwrap();
    assert_eq!(tab_a.current(), Some(principal));

    tab_b.logout().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), changes.wait_for(|s| !s.is_authenticated()))
        .await
        .expect("tab a saw the logout")
        .unwrap();

    tab_a.dispose();
    tab_a.dispose();
}

#[tokio::test(start_paused = true)]
async fn stale_login_loses_to_newer_external_change() {
    let shared = MemoryStorage::new();
    let slow_tab = Arc::new(SessionStore::new(
        Arc::new(shared.clone()),
        Arc::new(MockBackend::permissive().with_latency(Duration::from_millis(500))),
        SessionConfig::new(),
    ));
    let fast_tab = store(shared.clone(), MockBackend::permissive());
    slow_tab.hydrate();
    fast_tab.hydrate();
    slow_tab.start_sync();

    let pending = {
        let store = slow_tab.clone();
        tokio::spawn(async move { store.login("slow@example.com", "pw").await })
    };
    tokio::task::yield_now().await;

    let winner = fast_tab.admin_login("fast@example.com", "pw").await.unwrap();
    tokio::task::yield_now().await;

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::SessionRaceLost { .. }), "{err:?}");
    assert_eq!(slow_tab.current(), Some(winner.clone()));
    assert_eq!(stored(&shared), Some(winner));
}

#[tokio::test]
async fn sync_is_unavailable_without_change_feed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::new(
        Arc::new(leadtree_auth::FileStorage::new(dir.path())),
        Arc::new(MockBackend::permissive()),
        SessionConfig::new(),
    ));
    assert!(!store.start_sync());
    store.hydrate();
    store.login("a@example.com", "pw").await.unwrap();

    let reloaded = SessionStore::new(
        Arc::new(leadtree_auth::FileStorage::new(dir.path())),
        Arc::new(MockBackend::permissive()),
        SessionConfig::new(),
    );
    assert_eq!(reloaded.hydrate().principal, store.current());
}

#[tokio::test]
async fn role_and_admin_flag_do_not_imply_each_other() {
    let backend = MockBackend::strict()
        .with_account("root@example.com", "pw", "Root", Role::SuperAdmin)
        .with_account("ops@example.com", "pw", "Ops", Role::Admin);
    let store = store(MemoryStorage::new(), backend);
    store.hydrate();

    let via_user_portal = store.login("root@example.com", "pw").await.unwrap();
    assert_eq!(via_user_portal.role, Role::SuperAdmin);
    assert!(!via_user_portal.is_admin);
    assert!(store.has_permission("anything:at-all"));
    assert!(!store.snapshot().is_admin());

    let via_admin_portal = store.admin_login("ops@example.com", "pw").await.unwrap();
    assert!(via_admin_portal.is_admin);
    assert!(!store.has_role(Role::SuperAdmin));
}

#[tokio::test]
async fn expired_session_stops_passing_guards() {
    let backend = MockBackend::permissive().with_session_ttl(chrono::Duration::milliseconds(1));
    let store = store(MemoryStorage::new(), backend);
    store.hydrate();
    store.login("a@example.com", "pw").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.auth_header(), Err(SessionError::SessionExpired));
    assert!(!store.is_authenticated());
    assert_eq!(
        AuthenticatedGuard::new("/login").decide(&store.snapshot()),
        GuardDecision::Redirect {
            to: "/login".into(),
            replace: true
        }
    );

    let err = store
        .update_profile(ProfileUpdate {
            name: Some("Late".into()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::SessionExpired);
}
