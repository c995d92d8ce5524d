//! Per-request view of the portal's session.
//!
//! The portal holds one session. A request sees it only when it presents the
//! session's token as `Authorization: Bearer <token>`; every other request is
//! treated as signed out.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};
use leadtree_auth::SessionSnapshot;
use leadtree_http_errors::ApiError;

use crate::AppState;

#[derive(Debug, Clone)]
pub struct Caller {
    /// The session as this caller may see it.
    pub session: SessionSnapshot,
    /// True when the presented token belongs to the stored principal,
    /// expired or not.
    pub holds_session: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .map(parse_bearer)
            .transpose()?;

        let mut session = state.session.snapshot();
        let holds_session = match (&session.principal, presented) {
            (Some(principal), Some(token)) => principal.token.as_deref() == Some(token.as_str()),
            _ => false,
        };
        if !holds_session {
            session.principal = None;
        }

        Ok(Self {
            session,
            holds_session,
        })
    }
}

fn parse_bearer(value: &HeaderValue) -> Result<String, ApiError> {
    let invalid = || ApiError::unauthorized("invalid_authorization", "authorization header malformed");
    let token = value
        .to_str()
        .map_err(|_| invalid())?
        .trim()
        .strip_prefix("Bearer ")
        .ok_or_else(invalid)?
        .trim();
    if token.is_empty() {
        return Err(invalid());
    }
    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bearer_accepts_valid_token() {
        let header = HeaderValue::from_static("Bearer mock-abc");
        assert_eq!(parse_bearer(&header).unwrap(), "mock-abc");
    }

    #[test]
    fn parse_bearer_rejects_other_schemes_and_blank_tokens() {
        for raw in ["Basic abc", "Bearer   ", "mock-abc"] {
            let header = HeaderValue::from_static(raw);
            assert!(matches!(
                parse_bearer(&header),
                Err(ApiError::Unauthorized { code: "invalid_authorization", .. })
            ));
        }
    }
}
