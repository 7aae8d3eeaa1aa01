//! User administration handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthorizedUser;
use crate::models::UserResponse;
use crate::services::auth;
use crate::services::request_meta::ClientMeta;

/// `PATCH /users/{id}/status`: activate or deactivate a user (admin only).
pub async fn toggle_status_handler(
    State(state): State<AppState>,
    Extension(AuthorizedUser(actor)): Extension<AuthorizedUser>,
    ClientMeta(meta): ClientMeta,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = auth::toggle_user_status(&state, &actor, user_id, meta).await?;
    Ok(Json(UserResponse { user }))
}
