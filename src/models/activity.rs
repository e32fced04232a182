use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::row_parsers::{parse_enum, parse_opt_uuid, parse_uuid};
use crate::errors::AppError;
use crate::events::Severity;

pub const DEFAULT_ACTIVITY_LIMIT: i64 = 50;
pub const MAX_ACTIVITY_LIMIT: i64 = 200;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: Uuid,
    #[schema(example = "found_item.claimed")]
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub properties: Value,
    #[schema(value_type = String, example = "critical")]
    pub severity: Severity,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActivityEntry {
    pub id: String,
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<String>,
    pub subject_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub properties: String,
    pub severity: String,
}

impl TryFrom<DbActivityEntry> for ActivityEntry {
    type Error = AppError;

    fn try_from(value: DbActivityEntry) -> Result<Self, Self::Error> {
        Ok(ActivityEntry {
            id: parse_uuid("activity_log.id", &value.id)?,
            actor_id: parse_opt_uuid("activity_log.actor_id", value.actor_id.as_deref())?,
            subject_id: parse_opt_uuid("activity_log.subject_id", value.subject_id.as_deref())?,
            severity: parse_enum("activity_log.severity", &value.severity)?,
            properties: serde_json::from_str(&value.properties).unwrap_or(Value::Null),
            event_name: value.event_name,
            description: value.description,
            occurred_at: value.occurred_at,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Number of newest entries to return (default 50, max 200).
    pub limit: Option<i64>,
    /// Exact event name, e.g. `report.audited`.
    pub event_name: Option<String>,
}

impl ActivityQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT)
    }
}
