//! Authentication service: register/login/refresh flows delegating to
//! `vantage_core::auth`.

use tracing::info;
use uuid::Uuid;
use vantage_core::auth::password::hash_password;
use vantage_core::auth::store::normalize_email;
use vantage_core::models::activity::{ActivityAction, NewActivity, RequestMeta};
use vantage_core::models::auth::{NewUser, Role, TokenPair, User};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::RegisterRequest;

/// A user together with the token pair just issued for them.
#[derive(Debug)]
pub struct IssuedSession {
    pub user: User,
    pub tokens: TokenPair,
}

fn required(field: Option<String>, name: &str) -> AppResult<String> {
    match field.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{name} is required"))),
    }
}

/// Create an account and sign it in.
pub async fn register(
    state: &AppState,
    body: RegisterRequest,
    meta: RequestMeta,
) -> AppResult<IssuedSession> {
    let email = normalize_email(&required(body.email, "email")?);
    let name = required(body.name, "name")?;
    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("password is required".into()))?;
    if !email.contains('@') {
        return Err(AppError::Validation("email is invalid".into()));
    }
    let role = match body.role.as_deref() {
        None | Some("") => Role::default(),
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|e| AppError::Validation(e.to_string()))?,
    };

    let password_hash = hash_password(&password)?;
    let user = state
        .store
        .create_user(NewUser {
            email,
            name,
            password_hash,
            role,
        })
        .await?;
    let tokens = state.tokens.issue_pair(user.id)?;

    info!(user_id = %user.id, role = %user.role, "user registered");
    state.activity.record(
        NewActivity::new(user.id, ActivityAction::Create)
            .entity("user", user.id)
            .details(serde_json::json!({ "email": user.email, "role": user.role }))
            .meta(meta),
    );

    Ok(IssuedSession { user, tokens })
}

/// Authenticate with email + password.
pub async fn login(
    state: &AppState,
    email: Option<String>,
    password: Option<String>,
    meta: RequestMeta,
) -> AppResult<IssuedSession> {
    let email = required(email, "email")?;
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("password is required".into()))?;

    let mut user = state.store.verify_credentials(&email, &password).await?;
    state.store.record_login(user.id).await?;
    user.last_login_at = Some(chrono::Utc::now());
    let tokens = state.tokens.issue_pair(user.id)?;

    info!(user_id = %user.id, "user logged in");
    state
        .activity
        .record(NewActivity::new(user.id, ActivityAction::Login).meta(meta));

    Ok(IssuedSession { user, tokens })
}

/// Exchange a refresh token for a rotated pair.
pub async fn refresh(state: &AppState, refresh_token: Option<&str>) -> AppResult<TokenPair> {
    let token = refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("No refresh token".into()))?;
    let pair = state.tokens.refresh(token, state.store.as_ref()).await?;
    Ok(pair)
}

/// Record a logout for the bearer of `access_token`, if it is still valid.
pub fn logout(state: &AppState, access_token: Option<&str>, meta: RequestMeta) {
    let Some(user_id) = access_token.and_then(|t| state.tokens.verify_access(t).ok()) else {
        return;
    };
    info!(%user_id, "user logged out");
    state
        .activity
        .record(NewActivity::new(user_id, ActivityAction::Logout).meta(meta));
}

/// Load the user behind an authenticated request.
pub async fn current_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Flip a user's active flag on behalf of `actor`.
pub async fn toggle_user_status(
    state: &AppState,
    actor: &User,
    target_id: Uuid,
    meta: RequestMeta,
) -> AppResult<User> {
    if actor.id == target_id {
        return Err(AppError::Validation(
            "You cannot change your own status".into(),
        ));
    }
    let target = current_user(state, target_id).await?;
    let updated = state
        .store
        .set_active(target_id, !target.is_active)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(actor_id = %actor.id, user_id = %updated.id, is_active = updated.is_active, "user status toggled");
    state.activity.record(
        NewActivity::new(actor.id, ActivityAction::ToggleStatus)
            .entity("user", updated.id)
            .details(serde_json::json!({ "isActive": updated.is_active }))
            .meta(meta),
    );

    Ok(updated)
}
