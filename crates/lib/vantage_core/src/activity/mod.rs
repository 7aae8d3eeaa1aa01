//! Activity audit log.
//!
//! Writes go through [`ActivitySink`], which hands each entry to a background
//! task. Request handlers never wait on, or fail because of, an audit write.

pub mod sink;
pub mod store;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::activity::{ActivityEntry, NewActivity};

pub use sink::ActivitySink;
pub use store::{MemoryActivityStore, PgActivityStore};

/// Activity log errors.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Append-only persistence for activity entries.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Persist one entry.
    async fn insert(&self, activity: NewActivity) -> Result<ActivityEntry, ActivityError>;

    /// Most recent entries, newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<ActivityEntry>, ActivityError>;
}
