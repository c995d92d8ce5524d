use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header::RETRY_AFTER, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use leadtree_auth::{ContentDecision, Layout, Navigation, Role, RoleGuard, RouteKind, ACCESS_DENIED};
use leadtree_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::caller::Caller;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    /// Comma separated role names.
    pub allowed: Option<String>,
    pub fallback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleAccessResponse {
    pub granted: bool,
    pub decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub permission: String,
    pub granted: bool,
}

#[derive(Debug, Serialize)]
pub struct PageView {
    pub path: String,
    pub page: String,
    pub kind: RouteKind,
    pub layout: Layout,
    pub params: BTreeMap<String, String>,
}

/// In-page role check. Denial is an answer, not an error.
pub async fn check_roles(
    caller: Caller,
    Query(query): Query<RoleQuery>,
) -> ApiResult<Json<RoleAccessResponse>> {
    let allowed = parse_roles(query.allowed.as_deref().unwrap_or_default())?;
    let mut guard = RoleGuard::new(allowed);
    if let Some(fallback) = query.fallback.filter(|value| !value.trim().is_empty()) {
        guard = guard.with_fallback(fallback);
    }

    let response = match guard.decide(&caller.session) {
        ContentDecision::Children => RoleAccessResponse {
            granted: true,
            decision: "children",
            content: None,
        },
        ContentDecision::Fallback(content) => RoleAccessResponse {
            granted: false,
            decision: "fallback",
            content: Some(content),
        },
        ContentDecision::Denied => RoleAccessResponse {
            granted: false,
            decision: "denied",
            content: Some(ACCESS_DENIED.to_string()),
        },
    };
    Ok(Json(response))
}

pub async fn check_permission(
    caller: Caller,
    Path(permission): Path<String>,
) -> Json<PermissionResponse> {
    let granted = caller.session.has_permission(&permission);
    Json(PermissionResponse {
        permission,
        granted,
    })
}

/// Every path not claimed by the API is a page navigation through the
/// composed route table.
pub async fn navigate_page(
    State(state): State<AppState>,
    caller: Caller,
    method: Method,
    uri: Uri,
) -> Response {
    if (method != Method::GET && method != Method::HEAD) || uri.path().starts_with("/api/") {
        return ApiError::NotFound {
            code: "route_not_found",
            trace_id: None,
        }
        .into_response();
    }

    let navigation = state.routes.navigate(uri.path(), &caller.session);
    state.metrics.navigation(navigation.outcome());
    debug!(path = uri.path(), outcome = navigation.outcome(), "page navigation");

    match navigation {
        Navigation::Render(found) => Json(PageView {
            path: uri.path().to_string(),
            page: found.route.page.clone(),
            kind: found.route.kind,
            layout: found.route.layout,
            params: found.params,
        })
        .into_response(),
        Navigation::Redirect { to, .. } => Redirect::to(&to).into_response(),
        Navigation::Pending => loading_placeholder(),
        Navigation::NotFound => ApiError::NotFound {
            code: "route_not_found",
            trace_id: None,
        }
        .into_response(),
    }
}

fn loading_placeholder() -> Response {
    let body: Value = json!({ "status": "loading" });
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

fn parse_roles(raw: &str) -> ApiResult<Vec<Role>> {
    let roles = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<Role>().map_err(|err| ApiError::BadRequest {
                code: "unknown_role",
                trace_id: None,
                message: Some(err.to_string()),
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    if roles.is_empty() {
        return Err(ApiError::BadRequest {
            code: "missing_allowed_roles",
            trace_id: None,
            message: Some("allowed must list at least one role".into()),
        });
    }
    Ok(roles)
}
