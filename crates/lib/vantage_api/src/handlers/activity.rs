//! Activity log handlers.

use axum::Json;
use axum::extract::{Query, State};

use crate::AppState;
use crate::error::AppResult;
use crate::models::{ActivityListResponse, ActivityQuery};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// `GET /activity?limit=N`: most recent activity entries.
pub async fn recent_activity_handler(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<ActivityListResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let activities = state.activity_store.recent(limit).await?;
    Ok(Json(ActivityListResponse { activities }))
}
