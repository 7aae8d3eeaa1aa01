//! Authentication and authorization middleware.
//!
//! Two independent stages, composed per route group:
//!
//! 1. [`authenticate`]: bearer token → [`AuthenticatedUser`].
//! 2. [`authorize`]: [`AuthenticatedUser`] → role check → [`AuthorizedUser`].
//!
//! Access tokens carry only the subject, so `authorize` costs one credential
//! store lookup per privileged request.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;
use vantage_core::models::auth::{Role, User};

use crate::AppState;
use crate::error::AppError;

/// Verified subject, stored in request extensions by [`authenticate`].
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Full user record, stored in request extensions by [`authorize`].
#[derive(Debug, Clone)]
pub struct AuthorizedUser(pub User);

/// Roles allowed on admin-only routes.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Roles allowed on management routes.
pub const ADMIN_OR_MANAGER: &[Role] = &[Role::Admin, Role::Manager];

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware: verifies the bearer access token and injects
/// [`AuthenticatedUser`] into request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;

    let user_id = state
        .tokens
        .verify_access(token)
        .map_err(|_| AppError::Unauthorized("Not authorized, token failed".into()))?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

/// Axum middleware: requires [`authenticate`] to have run, loads the user and
/// checks their role against `allowed`.
///
/// ```ignore
/// .layer(from_fn_with_state(state.clone(), |s, r, n| authorize(s, ADMIN_ONLY, r, n)))
/// ```
pub async fn authorize(
    State(state): State<AppState>,
    allowed: &'static [Role],
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let AuthenticatedUser { user_id } = request
        .extensions()
        .get::<AuthenticatedUser>()
        .copied()
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;

    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if !allowed.contains(&user.role) {
        debug!(%user_id, role = %user.role, "role not permitted");
        return Err(AppError::Forbidden(format!(
            "Role '{}' is not authorized to access this resource",
            user.role
        )));
    }

    request.extensions_mut().insert(AuthorizedUser(user));
    Ok(next.run(request).await)
}
