use axum::{extract::State, http::StatusCode, Json};
use leadtree_auth::{Portal, Principal, ProfileUpdate, SessionError, SessionResult, SessionSnapshot};
use leadtree_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::caller::Caller;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub loading: bool,
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub version: u64,
    pub principal: Option<Principal>,
}

impl From<SessionSnapshot> for SessionView {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            loading: snapshot.loading,
            is_authenticated: snapshot.is_authenticated(),
            is_admin: snapshot.is_admin(),
            version: snapshot.version,
            principal: snapshot.active().cloned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub principal: Principal,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupBody {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn current_session(caller: Caller) -> Json<SessionView> {
    Json(caller.session.into())
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<PrincipalResponse>, SessionError> {
    let result = state.session.login(&body.email, &body.password).await;
    respond(&state, Portal::User, result)
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<PrincipalResponse>, SessionError> {
    let result = state.session.admin_login(&body.email, &body.password).await;
    respond(&state, Portal::Admin, result)
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> Result<Json<PrincipalResponse>, SessionError> {
    let principal = state
        .session
        .signup(&body.name, &body.email, &body.password)
        .await?;
    Ok(Json(PrincipalResponse { principal }))
}

/// Only the token holder can end the session; for anyone else it is the
/// signed-out no-op.
pub async fn logout(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<StatusCode, SessionError> {
    if caller.holds_session {
        state.session.logout().await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_profile(
    State(state): State<AppState>,
    caller: Caller,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<PrincipalResponse>> {
    if !caller.holds_session {
        return Err(SessionError::NoActiveSession.into());
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest {
            code: "empty_profile_update",
            trace_id: None,
            message: Some("Provide at least one of name, email, subscription".into()),
        });
    }
    let principal = state.session.update_profile(update).await?;
    Ok(Json(PrincipalResponse { principal }))
}

fn respond(
    state: &AppState,
    portal: Portal,
    result: SessionResult<Principal>,
) -> Result<Json<PrincipalResponse>, SessionError> {
    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.code(),
    };
    state.metrics.login_attempt(portal.as_str(), outcome);
    if let Ok(principal) = &result {
        if principal.token.is_none() {
            warn!(principal_id = %principal.id, "backend issued no token; session unreachable over HTTP");
        }
    }
    result.map(|principal| Json(PrincipalResponse { principal }))
}
