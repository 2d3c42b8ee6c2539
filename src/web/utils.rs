//! Shared helpers for the HTTP handlers.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::model::Identity;
use crate::web::state::AppState;

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Invalid(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a domain error onto the JSON error response.
pub fn app_error(err: AppError) -> Response {
    let status = status_for(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        crate::tlog!("internal error: {}", err);
    }
    api_error(status, err.to_string())
}

/// `200 OK` with a JSON body.
pub fn ok_json<T: serde::Serialize>(value: T) -> Response {
    (StatusCode::OK, axum::Json(value)).into_response()
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller's session, or the `401` response to return.
pub fn require_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, Response> {
    bearer_token(headers)
        .and_then(|token| state.sessions.resolve(token))
        .cloned()
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "sign in required"))
}

/// The caller's session if one was presented.
pub fn optional_identity(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    bearer_token(headers)
        .and_then(|token| state.sessions.resolve(token))
        .cloned()
}

/// Current time as milliseconds since UNIX epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
