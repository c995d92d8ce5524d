use std::time::Duration;

use axum::response::{IntoResponse, Response};
use leadtree_http_errors::ApiError;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account already exists for '{0}'")]
    AccountExists(String),
    #[error("authentication backend unreachable: {0}")]
    Network(String),
    #[error("authentication backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("session has expired")]
    SessionExpired,
    #[error("session storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("stored session is malformed: {0}")]
    MalformedSession(String),
    #[error("session changed while the operation was in flight (expected version {expected}, found {found})")]
    SessionRaceLost { expected: u64, found: u64 },
    #[error("no active session")]
    NoActiveSession,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidCredentials => "invalid_credentials",
            SessionError::AccountExists(_) => "account_exists",
            SessionError::Network(_) => "auth_backend_unavailable",
            SessionError::Timeout(_) => "auth_backend_timeout",
            SessionError::SessionExpired => "session_expired",
            SessionError::StorageUnavailable(_) => "storage_unavailable",
            SessionError::MalformedSession(_) => "malformed_session",
            SessionError::SessionRaceLost { .. } => "session_race_lost",
            SessionError::NoActiveSession => "no_active_session",
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        let code = value.code();
        let message = Some(value.to_string());
        match value {
            SessionError::InvalidCredentials
            | SessionError::SessionExpired
            | SessionError::NoActiveSession => ApiError::Unauthorized { code, message },
            SessionError::AccountExists(_) | SessionError::SessionRaceLost { .. } => {
                ApiError::Conflict { code, message }
            }
            SessionError::Network(_) | SessionError::StorageUnavailable(_) => {
                ApiError::ServiceUnavailable { code, message }
            }
            SessionError::Timeout(_) => ApiError::GatewayTimeout { message },
            SessionError::MalformedSession(_) => ApiError::Internal {
                trace_id: None,
                message,
            },
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
