//! Activity store implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ActivityError, ActivityStore};
use crate::models::activity::{ActivityAction, ActivityEntry, NewActivity};

/// PostgreSQL-backed activity store.
#[derive(Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Uuid,
    action: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    details: Option<serde_json::Value>,
    ip_address: String,
    user_agent: String,
    created_at: DateTime<Utc>,
}

impl ActivityRow {
    fn into_entry(self) -> Result<ActivityEntry, ActivityError> {
        let action: ActivityAction = self.action.parse().map_err(ActivityError::Internal)?;
        Ok(ActivityEntry {
            id: self.id,
            user_id: self.user_id,
            action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn insert(&self, activity: NewActivity) -> Result<ActivityEntry, ActivityError> {
        let row = sqlx::query_as::<_, ActivityRow>(
            r#"
            INSERT INTO activity_logs
                (id, user_id, action, entity_type, entity_id, details, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, action, entity_type, entity_id, details,
                      ip_address, user_agent, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(activity.user_id)
        .bind(activity.action.as_str())
        .bind(activity.entity_type)
        .bind(activity.entity_id)
        .bind(activity.details)
        .bind(activity.meta.ip_address)
        .bind(activity.meta.user_agent)
        .fetch_one(&self.pool)
        .await?;
        row.into_entry()
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ActivityEntry>, ActivityError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, details,
                   ip_address, user_agent, created_at
            FROM activity_logs
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ActivityRow::into_entry).collect()
    }
}

/// In-memory activity store for tests and local demos.
#[derive(Default)]
pub struct MemoryActivityStore {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn insert(&self, activity: NewActivity) -> Result<ActivityEntry, ActivityError> {
        let entry = ActivityEntry {
            id: Uuid::now_v7(),
            user_id: activity.user_id,
            action: activity.action,
            entity_type: activity.entity_type,
            entity_id: activity.entity_id,
            details: activity.details,
            ip_address: activity.meta.ip_address,
            user_agent: activity.meta.user_agent,
            created_at: Utc::now(),
        };
        self.entries
            .lock()
            .map_err(|e| ActivityError::Internal(format!("activity store poisoned: {e}")))?
            .push(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ActivityEntry>, ActivityError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| ActivityError::Internal(format!("activity store poisoned: {e}")))?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
