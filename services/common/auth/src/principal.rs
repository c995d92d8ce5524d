use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::roles::Role;

/// Plan usage shown in the dashboard header. Display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: String,
    pub leads_used: u32,
    pub leads_limit: u32,
}

impl Subscription {
    pub fn starter() -> Self {
        Self {
            plan: "starter".to_string(),
            leads_used: 0,
            leads_limit: 100,
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::starter()
    }
}

/// The signed-in user as persisted under the session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Set only by the admin portal login; independent of `role`.
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub subscription: Subscription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// Parses a persisted record. Any failure yields `MalformedSession` and
    /// nothing of the partial object is kept.
    pub fn from_stored(raw: &str) -> SessionResult<Self> {
        let principal: Principal = serde_json::from_str(raw)
            .map_err(|err| SessionError::MalformedSession(err.to_string()))?;
        if principal.id.trim().is_empty() {
            return Err(SessionError::MalformedSession("empty principal id".to_string()));
        }
        Ok(principal)
    }

    pub fn to_stored(&self) -> SessionResult<String> {
        serde_json::to_string(self).map_err(|err| SessionError::MalformedSession(err.to_string()))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// `Authorization` header value for REST collaborators.
    pub fn bearer(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {token}"))
    }

    pub fn apply(&mut self, update: ProfileUpdate) {
        let ProfileUpdate {
            name,
            email,
            subscription,
        } = update;
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(subscription) = subscription {
            self.subscription = subscription;
        }
    }
}

/// Shallow profile patch. Each present field replaces the whole field.
/// `role` and `is_admin` are absent: they only come from the
/// authentication backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.subscription.is_none()
    }
}
