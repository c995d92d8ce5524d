//! Route table composition.
//!
//! Four declarative lists (public, admin sign-in, user-protected,
//! admin-protected) become one ordered table where each entry carries its
//! guard and layout shell. Matching is first-match in composed order, so each
//! list must be written most specific first.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RoutePaths;
use crate::guards::{AdminAuthenticatedGuard, AuthenticatedGuard, GuardDecision, PublicGate};
use crate::store::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub path: String,
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_when_authenticated: Option<String>,
}

impl RouteEntry {
    pub fn new(path: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            page: page.into(),
            redirect_when_authenticated: None,
        }
    }

    pub fn redirect_when_authenticated(mut self, to: impl Into<String>) -> Self {
        self.redirect_when_authenticated = Some(to.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTables {
    pub public: Vec<RouteEntry>,
    pub admin_auth: Vec<RouteEntry>,
    pub protected: Vec<RouteEntry>,
    pub admin_protected: Vec<RouteEntry>,
    /// Where unmatched paths go; `None` means not found.
    pub fallback_redirect: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Bare,
    Main,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Public,
    AdminAuth,
    Protected,
    AdminProtected,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Public => "public",
            RouteKind::AdminAuth => "admin_auth",
            RouteKind::Protected => "protected",
            RouteKind::AdminProtected => "admin_protected",
        }
    }

    fn layout(&self) -> Layout {
        match self {
            RouteKind::Public | RouteKind::AdminAuth => Layout::Bare,
            RouteKind::Protected => Layout::Main,
            RouteKind::AdminProtected => Layout::Admin,
        }
    }
}

#[derive(Debug, Clone)]
enum RouteAccess {
    Open(PublicGate),
    User(AuthenticatedGuard),
    Admin(AdminAuthenticatedGuard),
}

impl RouteAccess {
    fn decide(&self, session: &SessionSnapshot) -> GuardDecision {
        match self {
            RouteAccess::Open(gate) => gate.decide(session),
            RouteAccess::User(guard) => guard.decide(session),
            RouteAccess::Admin(guard) => guard.decide(session),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest,
}

#[derive(Debug, Clone)]
pub struct ComposedRoute {
    pub path: String,
    pub page: String,
    pub kind: RouteKind,
    pub layout: Layout,
    access: RouteAccess,
    segments: Vec<Segment>,
}

impl ComposedRoute {
    pub fn decide(&self, session: &SessionSnapshot) -> GuardDecision {
        self.access.decide(session)
    }

    fn matches(&self, request: &[&str]) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => {
                    params.insert("*".to_string(), request.get(index..).unwrap_or(&[]).join("/"));
                    return Some(params);
                }
                Segment::Literal(expected) => {
                    if request.get(index) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = request.get(index)?;
                    params.insert(name.clone(), (*value).to_string());
                }
            }
        }
        (request.len() == self.segments.len()).then_some(params)
    }
}

#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a ComposedRoute,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub enum Navigation<'a> {
    Pending,
    Render(RouteMatch<'a>),
    Redirect { to: String, replace: bool },
    NotFound,
}

impl Navigation<'_> {
    pub fn outcome(&self) -> &'static str {
        match self {
            Navigation::Pending => "pending",
            Navigation::Render(_) => "render",
            Navigation::Redirect { .. } => "redirect",
            Navigation::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route '{path}' is declared in both the {first} and {second} tables")]
    DuplicateRoute {
        path: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("invalid route pattern '{path}': {reason}")]
    InvalidPattern { path: String, reason: &'static str },
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<ComposedRoute>,
    paths: RoutePaths,
    fallback_redirect: Option<String>,
}

impl RouteTable {
    pub fn compose(tables: RouteTables, paths: RoutePaths) -> Result<Self, RouteError> {
        let RouteTables {
            public,
            admin_auth,
            protected,
            admin_protected,
            fallback_redirect,
        } = tables;

        let mut seen: HashMap<String, RouteKind> = HashMap::new();
        let mut routes = Vec::new();

        let lists = [
            (RouteKind::Public, public),
            (RouteKind::AdminAuth, admin_auth),
            (RouteKind::Protected, protected),
            (RouteKind::AdminProtected, admin_protected),
        ];

        for (kind, entries) in lists {
            for entry in entries {
                let path = normalize(&entry.path);
                match seen.get(&path).copied() {
                    Some(first) if first != kind => {
                        return Err(RouteError::DuplicateRoute {
                            path,
                            first: first.as_str(),
                            second: kind.as_str(),
                        });
                    }
                    Some(_) => warn!(path = %path, table = kind.as_str(), "route shadowed by an earlier entry"),
                    None => {
                        seen.insert(path.clone(), kind);
                    }
                }

                let segments = parse_pattern(&path)?;
                let access = match kind {
                    RouteKind::Public => {
                        RouteAccess::Open(PublicGate::public(entry.redirect_when_authenticated))
                    }
                    RouteKind::AdminAuth => {
                        RouteAccess::Open(PublicGate::admin_auth(entry.redirect_when_authenticated))
                    }
                    RouteKind::Protected => RouteAccess::User(AuthenticatedGuard::new(&paths.login)),
                    RouteKind::AdminProtected => {
                        RouteAccess::Admin(AdminAuthenticatedGuard::new(&paths.admin_login))
                    }
                };

                routes.push(ComposedRoute {
                    path,
                    page: entry.page,
                    kind,
                    layout: kind.layout(),
                    access,
                    segments,
                });
            }
        }

        debug!(routes = routes.len(), "route table composed");
        Ok(Self {
            routes,
            paths,
            fallback_redirect,
        })
    }

    pub fn routes(&self) -> &[ComposedRoute] {
        &self.routes
    }

    pub fn paths(&self) -> &RoutePaths {
        &self.paths
    }

    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        let normalized = normalize(path);
        // Undecodable segments match nothing.
        let decoded = split(&normalized)
            .into_iter()
            .map(|segment| urlencoding::decode(segment).ok().map(|value| value.into_owned()))
            .collect::<Option<Vec<String>>>()?;
        let request: Vec<&str> = decoded.iter().map(String::as_str).collect();
        self.routes.iter().find_map(|route| {
            route
                .matches(&request)
                .map(|params| RouteMatch { route, params })
        })
    }

    pub fn navigate(&self, path: &str, session: &SessionSnapshot) -> Navigation<'_> {
        let Some(found) = self.resolve(path) else {
            return match &self.fallback_redirect {
                Some(to) => Navigation::Redirect {
                    to: to.clone(),
                    replace: true,
                },
                None => Navigation::NotFound,
            };
        };

        match found.route.decide(session) {
            GuardDecision::Pending => Navigation::Pending,
            GuardDecision::Render => Navigation::Render(found),
            GuardDecision::Redirect { to, replace } => Navigation::Redirect { to, replace },
        }
    }
}

fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn parse_pattern(path: &str) -> Result<Vec<Segment>, RouteError> {
    let raw = split(path);
    let last = raw.len().saturating_sub(1);
    raw.iter()
        .enumerate()
        .map(|(index, segment)| {
            if *segment == "*" {
                if index != last {
                    return Err(RouteError::InvalidPattern {
                        path: path.to_string(),
                        reason: "'*' must be the final segment",
                    });
                }
                Ok(Segment::Rest)
            } else if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(RouteError::InvalidPattern {
                        path: path.to_string(),
                        reason: "parameter segment needs a name",
                    });
                }
                Ok(Segment::Param(name.to_string()))
            } else {
                Ok(Segment::Literal((*segment).to_string()))
            }
        })
        .collect()
}
