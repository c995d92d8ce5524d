use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::permissions;

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_TEAM_MEMBER: &str = "team_member";
pub const ROLE_CLIENT: &str = "client";

/// Highest privilege first.
pub const ROLE_HIERARCHY: &[&str] = &[ROLE_SUPER_ADMIN, ROLE_ADMIN, ROLE_TEAM_MEMBER, ROLE_CLIENT];

/// Coarse-grained trust level of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    TeamMember,
    Client,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Client, Role::TeamMember, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => ROLE_SUPER_ADMIN,
            Role::Admin => ROLE_ADMIN,
            Role::TeamMember => ROLE_TEAM_MEMBER,
            Role::Client => ROLE_CLIENT,
        }
    }

    /// Position in the ordinal hierarchy, `client = 1` up to `super_admin = 4`.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Client => 1,
            Role::TeamMember => 2,
            Role::Admin => 3,
            Role::SuperAdmin => 4,
        }
    }

    pub fn at_least(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn permissions(&self) -> &'static [&'static str] {
        permissions::for_role(*self)
    }

    pub fn grants(&self, permission: &str) -> bool {
        let set = self.permissions();
        set.contains(&permissions::WILDCARD) || set.contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            ROLE_SUPER_ADMIN => Ok(Role::SuperAdmin),
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_TEAM_MEMBER => Ok(Role::TeamMember),
            ROLE_CLIENT => Ok(Role::Client),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Rank of a role string; `None` for anything outside the enumeration.
pub fn rank(role: &str) -> Option<u8> {
    role.parse::<Role>().ok().map(|role| role.rank())
}

/// At-least check over the hierarchy. Unknown or missing roles never pass.
pub fn has_role(current: Option<&str>, required: &str) -> bool {
    match (current.and_then(rank), rank(required)) {
        (Some(current), Some(required)) => current >= required,
        _ => false,
    }
}

/// Exact-match or wildcard permission check for a role string.
pub fn has_permission(current: Option<&str>, permission: &str) -> bool {
    current
        .and_then(|role| role.parse::<Role>().ok())
        .map(|role| role.grants(permission))
        .unwrap_or(false)
}
