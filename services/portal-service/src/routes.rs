//! LeadTree's page map. Order inside each list is match precedence.

use leadtree_auth::{RouteEntry, RoutePaths, RouteTables};

pub fn leadtree_route_tables(paths: &RoutePaths) -> RouteTables {
    RouteTables {
        public: vec![
            RouteEntry::new("/", "Landing").redirect_when_authenticated(&paths.dashboard),
            RouteEntry::new(&paths.login, "Login").redirect_when_authenticated(&paths.dashboard),
            RouteEntry::new("/signup", "Signup").redirect_when_authenticated(&paths.dashboard),
            RouteEntry::new("/forgot-password", "ForgotPassword"),
        ],
        admin_auth: vec![RouteEntry::new(&paths.admin_login, "AdminLogin")
            .redirect_when_authenticated(&paths.admin_dashboard)],
        protected: vec![
            RouteEntry::new(&paths.dashboard, "Dashboard"),
            RouteEntry::new("/leads/new", "LeadCreate"),
            RouteEntry::new("/leads/:leadId", "LeadDetail"),
            RouteEntry::new("/leads", "Leads"),
            RouteEntry::new("/campaigns/new", "CampaignCreate"),
            RouteEntry::new("/campaigns/:campaignId", "CampaignDetail"),
            RouteEntry::new("/campaigns", "Campaigns"),
            RouteEntry::new("/email-tracking", "EmailTracking"),
            RouteEntry::new("/billing", "Billing"),
            RouteEntry::new("/settings", "Settings"),
            RouteEntry::new("/profile", "Profile"),
        ],
        admin_protected: vec![
            RouteEntry::new(&paths.admin_dashboard, "AdminDashboard"),
            RouteEntry::new("/admin/users/:userId", "AdminUserDetail"),
            RouteEntry::new("/admin/users", "AdminUsers"),
            RouteEntry::new("/admin/roles", "AdminRoles"),
            RouteEntry::new("/admin/subscriptions", "AdminSubscriptions"),
            RouteEntry::new("/admin/content", "AdminContent"),
            RouteEntry::new("/admin/api-keys", "AdminApiKeys"),
            RouteEntry::new("/admin/billing", "AdminBilling"),
            RouteEntry::new("/admin/settings", "AdminSettings"),
        ],
        fallback_redirect: Some("/".to_string()),
    }
}
