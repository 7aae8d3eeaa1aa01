//! Authentication request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthenticatedUser, bearer_token};
use crate::models::{
    AuthResponse, LoginRequest, LogoutResponse, RefreshRequest, RefreshResponse, RegisterRequest,
    UserResponse,
};
use crate::services::auth;
use crate::services::cookies::{REFRESH_COOKIE, clear_refresh_cookie, refresh_cookie};
use crate::services::request_meta::ClientMeta;

fn with_refresh_cookie(state: &AppState, jar: CookieJar, token: &str) -> CookieJar {
    jar.add(refresh_cookie(
        token,
        state.tokens.refresh_ttl_secs(),
        state.config.env.is_production(),
    ))
}

/// `POST /auth/register`: create a new user account and sign it in.
pub async fn register_handler(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    jar: CookieJar,
    WithRejection(Json(body), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let issued = auth::register(&state, body, meta).await?;
    let jar = with_refresh_cookie(&state, jar, &issued.tokens.refresh_token);
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            user: issued.user,
            access_token: issued.tokens.access_token,
        }),
    ))
}

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    jar: CookieJar,
    WithRejection(Json(body), _): WithRejection<Json<LoginRequest>, AppError>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let issued = auth::login(&state, body.email, body.password, meta).await?;
    let jar = with_refresh_cookie(&state, jar, &issued.tokens.refresh_token);
    Ok((
        jar,
        Json(AuthResponse {
            user: issued.user,
            access_token: issued.tokens.access_token,
        }),
    ))
}

/// `POST /auth/refresh`: exchange the refresh cookie (or a `refreshToken`
/// body field) for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, Json<RefreshResponse>)> {
    let from_cookie = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let (token, via_body) = match from_cookie {
        Some(token) => (Some(token), false),
        None => {
            let fallback = if body.is_empty() {
                RefreshRequest::default()
            } else {
                serde_json::from_slice::<RefreshRequest>(&body)
                    .map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?
            };
            (fallback.refresh_token, true)
        }
    };

    let pair = auth::refresh(&state, token.as_deref()).await?;
    let jar = with_refresh_cookie(&state, jar, &pair.refresh_token);
    Ok((
        jar,
        Json(RefreshResponse {
            access_token: pair.access_token,
            refresh_token: via_body.then_some(pair.refresh_token),
        }),
    ))
}

/// `POST /auth/logout`: clear the refresh cookie. Always succeeds.
pub async fn logout_handler(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    auth::logout(&state, bearer_token(&headers), meta);
    let jar = jar.add(clear_refresh_cookie(state.config.env.is_production()));
    (jar, Json(LogoutResponse { success: true }))
}

/// `GET /auth/me`: the authenticated user's profile.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserResponse>> {
    let user = auth::current_user(&state, auth_user.user_id).await?;
    Ok(Json(UserResponse { user }))
}
