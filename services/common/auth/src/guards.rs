//! Render-time access decisions. Guards never perform I/O and never fail:
//! they read a [`SessionSnapshot`] and say what to show.

use serde::Serialize;

use crate::roles::Role;
use crate::store::SessionSnapshot;

pub const ACCESS_DENIED: &str = "Access denied";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session still hydrating; show a neutral placeholder.
    Pending,
    Render,
    /// `replace` means the guarded page is not kept in history.
    Redirect { to: String, replace: bool },
}

impl GuardDecision {
    fn redirect(to: &str) -> Self {
        GuardDecision::Redirect {
            to: to.to_string(),
            replace: true,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            GuardDecision::Pending => "pending",
            GuardDecision::Render => "render",
            GuardDecision::Redirect { .. } => "redirect",
        }
    }
}

/// Any signed-in principal passes.
#[derive(Debug, Clone)]
pub struct AuthenticatedGuard {
    login_path: String,
}

impl AuthenticatedGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn decide(&self, session: &SessionSnapshot) -> GuardDecision {
        if session.loading {
            return GuardDecision::Pending;
        }
        if session.is_authenticated() {
            GuardDecision::Render
        } else {
            GuardDecision::redirect(&self.login_path)
        }
    }
}

/// Passes only sessions that entered through the admin portal. The role
/// hierarchy is not consulted: a `super_admin` signed in through the user
/// portal is sent to the admin login.
#[derive(Debug, Clone)]
pub struct AdminAuthenticatedGuard {
    admin_login_path: String,
}

impl AdminAuthenticatedGuard {
    pub fn new(admin_login_path: impl Into<String>) -> Self {
        Self {
            admin_login_path: admin_login_path.into(),
        }
    }

    pub fn decide(&self, session: &SessionSnapshot) -> GuardDecision {
        if session.loading {
            return GuardDecision::Pending;
        }
        if session.is_authenticated() && session.is_admin() {
            GuardDecision::Render
        } else {
            GuardDecision::redirect(&self.admin_login_path)
        }
    }
}

/// Redirect-away gate for sign-in pages: once the session qualifies, send it
/// to the route's own landing target instead of showing the form again.
#[derive(Debug, Clone)]
pub struct PublicGate {
    redirect_to: Option<String>,
    require_admin: bool,
}

impl PublicGate {
    pub fn public(redirect_to: Option<String>) -> Self {
        Self {
            redirect_to,
            require_admin: false,
        }
    }

    pub fn admin_auth(redirect_to: Option<String>) -> Self {
        Self {
            redirect_to,
            require_admin: true,
        }
    }

    pub fn decide(&self, session: &SessionSnapshot) -> GuardDecision {
        let Some(target) = &self.redirect_to else {
            return GuardDecision::Render;
        };
        let qualifies = session.is_authenticated() && (!self.require_admin || session.is_admin());
        if qualifies {
            GuardDecision::redirect(target)
        } else {
            GuardDecision::Render
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "content", rename_all = "snake_case")]
pub enum ContentDecision {
    Children,
    /// Caller-supplied replacement content.
    Fallback(String),
    /// Generic denial, shown when no fallback was given.
    Denied,
}

impl ContentDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, ContentDecision::Children)
    }
}

/// In-page allow-list check. Denies in place, never redirects.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: Vec<Role>,
    fallback: Option<String>,
}

impl RoleGuard {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn allowed(&self) -> &[Role] {
        &self.allowed
    }

    pub fn decide(&self, session: &SessionSnapshot) -> ContentDecision {
        let permitted = session
            .role()
            .map(|role| self.allowed.contains(&role))
            .unwrap_or(false);

        if permitted {
            ContentDecision::Children
        } else {
            match &self.fallback {
                Some(fallback) => ContentDecision::Fallback(fallback.clone()),
                None => ContentDecision::Denied,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::{Principal, Subscription};

    fn principal(role: Role, is_admin: bool) -> Principal {
        Principal {
            id: "1".into(),
            email: "a@b.c".into(),
            name: "A".into(),
            role,
            is_admin,
            subscription: Subscription::starter(),
            token: None,
            expires_at: None,
        }
    }

    fn signed_in(role: Role, is_admin: bool) -> SessionSnapshot {
        SessionSnapshot::ready(Some(principal(role, is_admin)))
    }

    fn login_redirect(to: &str) -> GuardDecision {
        GuardDecision::Redirect {
            to: to.into(),
            replace: true,
        }
    }

    #[test]
    fn scenario_a_signed_out_redirects_to_login() {
        let guard = AuthenticatedGuard::new("/login");
        assert_eq!(guard.decide(&SessionSnapshot::ready(None)), login_redirect("/login"));
    }

    #[test]
    fn scenario_b_non_admin_session_redirects_to_admin_login() {
        let guard = AdminAuthenticatedGuard::new("/admin/login");
        let session = signed_in(Role::Client, false);
        assert!(session.is_authenticated());
        assert_eq!(guard.decide(&session), login_redirect("/admin/login"));
    }

    #[test]
    fn scenario_c_admin_session_renders() {
        let guard = AdminAuthenticatedGuard::new("/admin/login");
        assert_eq!(guard.decide(&signed_in(Role::SuperAdmin, true)), GuardDecision::Render);
    }

    #[test]
    fn scenario_d_loading_is_pending_for_both_guards() {
        let user = AuthenticatedGuard::new("/login");
        let admin = AdminAuthenticatedGuard::new("/admin/login");
        let mut with_principal = signed_in(Role::Admin, true);
        with_principal.loading = true;
        for session in [SessionSnapshot::loading(), with_principal] {
            assert_eq!(user.decide(&session), GuardDecision::Pending);
            assert_eq!(admin.decide(&session), GuardDecision::Pending);
        }
    }

    #[test]
    fn scenario_e_role_guard_denies_team_member() {
        let guard = RoleGuard::new([Role::Admin, Role::SuperAdmin]);
        assert_eq!(guard.decide(&signed_in(Role::TeamMember, false)), ContentDecision::Denied);

        let guard = guard.with_fallback("Ask an admin");
        assert_eq!(
            guard.decide(&signed_in(Role::TeamMember, false)),
            ContentDecision::Fallback("Ask an admin".into())
        );
        assert!(guard.decide(&signed_in(Role::Admin, false)).is_granted());
    }

    #[test]
    fn expired_principal_counts_as_signed_out() {
        let mut expired = principal(Role::SuperAdmin, true);
        expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::seconds(1));
        let session = SessionSnapshot::ready(Some(expired));

        assert!(!session.is_authenticated());
        assert_eq!(AuthenticatedGuard::new("/login").decide(&session), login_redirect("/login"));
        assert_eq!(
            AdminAuthenticatedGuard::new("/admin/login").decide(&session),
            login_redirect("/admin/login")
        );
        assert_eq!(
            RoleGuard::new([Role::SuperAdmin]).decide(&session),
            ContentDecision::Denied
        );
        assert_eq!(
            PublicGate::public(Some("/dashboard".into())).decide(&session),
            GuardDecision::Render
        );
    }

    #[test]
    fn role_guard_is_an_exact_allow_list() {
        // super_admin outranks admin but is not in the list
        let guard = RoleGuard::new([Role::Admin]);
        assert_eq!(guard.decide(&signed_in(Role::SuperAdmin, true)), ContentDecision::Denied);
        assert_eq!(guard.decide(&SessionSnapshot::ready(None)), ContentDecision::Denied);
        assert_eq!(guard.decide(&SessionSnapshot::loading()), ContentDecision::Denied);
    }

    #[test]
    fn super_admin_role_alone_does_not_open_admin_routes() {
        let admin_guard = AdminAuthenticatedGuard::new("/admin/login");
        assert_eq!(
            admin_guard.decide(&signed_in(Role::SuperAdmin, false)),
            login_redirect("/admin/login")
        );
    }

    #[test]
    fn admin_flag_does_not_imply_elevated_role() {
        let session = signed_in(Role::Client, true);
        assert_eq!(
            AdminAuthenticatedGuard::new("/admin/login").decide(&session),
            GuardDecision::Render
        );
        assert!(!session.has_role(Role::Admin));
        assert!(!session.has_permission("users:write"));
    }

    #[test]
    fn public_gate_redirects_qualifying_sessions() {
        let gate = PublicGate::public(Some("/dashboard".into()));
        assert_eq!(gate.decide(&SessionSnapshot::ready(None)), GuardDecision::Render);
        assert_eq!(gate.decide(&signed_in(Role::Client, false)), login_redirect("/dashboard"));

        let admin_gate = PublicGate::admin_auth(Some("/admin/dashboard".into()));
        assert_eq!(admin_gate.decide(&signed_in(Role::Client, false)), GuardDecision::Render);
        assert_eq!(
            admin_gate.decide(&signed_in(Role::Client, true)),
            login_redirect("/admin/dashboard")
        );

        let no_target = PublicGate::public(None);
        assert_eq!(no_target.decide(&signed_in(Role::Client, false)), GuardDecision::Render);
    }
}
