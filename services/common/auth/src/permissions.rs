//! Permission matrix. Permissions are `resource:action` strings; a role grants
//! a permission when its set holds the exact string or the wildcard.

use crate::roles::Role;

pub const WILDCARD: &str = "*";

const SUPER_ADMIN: &[&str] = &[WILDCARD];

const ADMIN: &[&str] = &[
    "leads:read",
    "leads:write",
    "leads:delete",
    "campaigns:read",
    "campaigns:write",
    "campaigns:delete",
    "email:read",
    "email:write",
    "email:delete",
    "users:read",
    "users:write",
    "billing:read",
    "billing:write",
    "analytics:read",
    "settings:read",
    "settings:write",
    "api_keys:read",
    "api_keys:write",
    "content:read",
    "content:write",
];

const TEAM_MEMBER: &[&str] = &[
    "leads:read",
    "leads:write",
    "campaigns:read",
    "campaigns:write",
    "email:read",
    "email:write",
    "analytics:read",
];

const CLIENT: &[&str] = &[
    "leads:read",
    "campaigns:read",
    "email:read",
    "billing:read",
    "analytics:read",
];

pub fn for_role(role: Role) -> &'static [&'static str] {
    match role {
        Role::SuperAdmin => SUPER_ADMIN,
        Role::Admin => ADMIN,
        Role::TeamMember => TEAM_MEMBER,
        Role::Client => CLIENT,
    }
}

/// Every explicit permission named anywhere in the matrix, sorted and deduplicated.
pub fn all_permissions() -> Vec<&'static str> {
    let mut all: Vec<&'static str> = Role::ALL
        .iter()
        .flat_map(|role| for_role(*role).iter().copied())
        .filter(|permission| *permission != WILDCARD)
        .collect();
    all.sort_unstable();
    all.dedup();
    all
}
