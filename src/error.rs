//! Application-level errors shared by the domain modules.

use crate::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    Store(StoreError),
    /// Malformed or empty input.
    Invalid(String),
    /// No session, or bad credentials.
    Unauthorized(String),
    /// Authenticated, but not allowed to touch this item.
    Forbidden(String),
    NotFound(String),
    Conflict(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Store(e) => write!(f, "{e}"),
            AppError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Conflict(msg) => write!(f, "conflict: {msg}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidPath(p) => AppError::Invalid(format!("invalid identifier: {p}")),
            other => AppError::Store(other),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Store(StoreError::Serde(e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
