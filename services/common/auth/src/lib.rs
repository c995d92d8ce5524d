pub mod backend;
pub mod config;
pub mod error;
pub mod guards;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod routes;
pub mod storage;
pub mod store;

pub use backend::{AuthBackend, Credentials, HttpAuthBackend, MockBackend, Portal, SignupRequest};
pub use config::{RoutePaths, SessionConfig, DEFAULT_STORAGE_KEY};
pub use error::{SessionError, SessionResult};
pub use guards::{
    AdminAuthenticatedGuard, AuthenticatedGuard, ContentDecision, GuardDecision, PublicGate,
    RoleGuard, ACCESS_DENIED,
};
pub use permissions::{all_permissions, WILDCARD};
pub use principal::{Principal, ProfileUpdate, Subscription};
pub use roles::{
    has_permission, has_role, rank, Role, UnknownRole, ROLE_ADMIN, ROLE_CLIENT, ROLE_HIERARCHY,
    ROLE_SUPER_ADMIN, ROLE_TEAM_MEMBER,
};
pub use routes::{
    ComposedRoute, Layout, Navigation, RouteEntry, RouteError, RouteKind, RouteMatch, RouteTable,
    RouteTables,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageEvent};
pub use store::{SessionSnapshot, SessionStore};
