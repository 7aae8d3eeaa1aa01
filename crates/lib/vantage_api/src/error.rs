//! Application error types.

use axum::{
    Json,
    body::Body,
    extract::rejection::JsonRejection,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use vantage_core::activity::ActivityError;
use vantage_core::auth::AuthError;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

/// Internal error message carried in response extensions so that
/// [`expose_error_detail`] can surface it in development.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::BAD_REQUEST, "conflict", m.as_str()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
            detail: None,
        });
        let mut response = (status, body).into_response();
        if let AppError::Internal(detail) = self {
            error!("internal error: {detail}");
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

/// Response mapper installed in development: rewrites 500 bodies to include
/// the internal error detail.
pub async fn expose_error_detail(response: Response) -> Response {
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    let body = ErrorResponse {
        error: "internal_error".into(),
        message: "Internal server error".into(),
        detail: Some(detail),
    };
    match serde_json::to_vec(&body) {
        Ok(bytes) => {
            parts.headers.remove(axum::http::header::CONTENT_LENGTH);
            parts.headers.insert(
                CONTENT_TYPE,
                axum::http::HeaderValue::from_static("application/json"),
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(_) => Response::from_parts(parts, Body::empty()),
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials
            | AuthError::AccountDeactivated
            | AuthError::InvalidToken(_)
            | AuthError::SubjectNotFound => AppError::Unauthorized(e.to_string()),
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::EmailTaken => AppError::Conflict("Email already registered".into()),
            AuthError::Config(msg) | AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Malformed or mistyped JSON bodies are validation errors, not 415/422.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<ActivityError> for AppError {
    fn from(e: ActivityError) -> Self {
        AppError::Internal(e.to_string())
    }
}
