//! Activity log models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Security-relevant action recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Login,
    Logout,
    Create,
    Update,
    Delete,
    ToggleStatus,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ToggleStatus => "toggle_status",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "logout" => Ok(Self::Logout),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "toggle_status" => Ok(Self::ToggleStatus),
            other => Err(format!("unknown activity action: {other}")),
        }
    }
}

/// Requester metadata captured alongside an activity entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub ip_address: String,
    pub user_agent: String,
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self {
            ip_address: "unknown".to_string(),
            user_agent: "unknown".to_string(),
        }
    }
}

/// An activity to be recorded.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: Uuid,
    pub action: ActivityAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub meta: RequestMeta,
}

impl NewActivity {
    pub fn new(user_id: Uuid, action: ActivityAction) -> Self {
        Self {
            user_id,
            action,
            entity_type: None,
            entity_id: None,
            details: None,
            meta: RequestMeta::default(),
        }
    }

    pub fn entity(mut self, entity_type: &str, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// A recorded, immutable activity log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: ActivityAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}
