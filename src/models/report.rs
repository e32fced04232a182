use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::db::row_parsers::{parse_enum, parse_opt_uuid, parse_uuid};
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

/// Lifecycle of a lost-item report.
///
/// `PENDING -> VERIFIED | REJECTED`, `VERIFIED -> RESOLVED`. `REJECTED` and `RESOLVED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    Pending,
    Verified,
    Rejected,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "PENDING",
            ReportStatus::Verified => "VERIFIED",
            ReportStatus::Rejected => "REJECTED",
            ReportStatus::Resolved => "RESOLVED",
        }
    }

    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::Pending, ReportStatus::Verified)
                | (ReportStatus::Pending, ReportStatus::Rejected)
                | (ReportStatus::Verified, ReportStatus::Resolved)
        )
    }

    /// Whether a found item may still be claimed against this report.
    pub fn is_open(&self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::Verified)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReportStatus::Pending),
            "VERIFIED" => Ok(ReportStatus::Verified),
            "REJECTED" => Ok(ReportStatus::Rejected),
            "RESOLVED" => Ok(ReportStatus::Resolved),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub item_name: String,
    pub description: Option<String>,
    pub lost_location: String,
    #[schema(example = "2025-09-01T08:30:00Z")]
    pub lost_at: DateTime<Utc>,
    pub contact: Option<String>,
    pub status: ReportStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for Report {
    fn entity_type() -> &'static str { "report" }
    fn subject_id(&self) -> Uuid { self.id }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "audited" => Severity::Critical,
            _ => self.severity(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbReport {
    pub id: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub item_name: String,
    pub description: Option<String>,
    pub lost_location: String,
    pub lost_at: DateTime<Utc>,
    pub contact: Option<String>,
    pub status: String,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub const REPORT_COLUMNS: &str = "id, user_id, category_id, item_name, description, lost_location, lost_at, contact, status, admin_note, created_at, updated_at, deleted_at";

impl TryFrom<DbReport> for Report {
    type Error = AppError;

    fn try_from(value: DbReport) -> Result<Self, Self::Error> {
        Ok(Report {
            id: parse_uuid("reports.id", &value.id)?,
            user_id: parse_uuid("reports.user_id", &value.user_id)?,
            category_id: parse_opt_uuid("reports.category_id", value.category_id.as_deref())?,
            status: parse_enum("reports.status", &value.status)?,
            item_name: value.item_name,
            description: value.description,
            lost_location: value.lost_location,
            lost_at: value.lost_at,
            contact: value.contact,
            admin_note: value.admin_note,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportCreateRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    #[schema(example = "Dompet kulit coklat")]
    pub item_name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Perpustakaan pusat lantai 2")]
    pub lost_location: String,
    pub lost_at: DateTime<Utc>,
    #[validate(length(max = 100))]
    #[schema(example = "0812-3456-7890")]
    pub contact: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportUpdateRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub item_name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub lost_location: Option<String>,
    pub lost_at: Option<DateTime<Utc>>,
    #[validate(length(max = 100))]
    pub contact: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportStatusRequest {
    pub status: ReportStatus,
    #[validate(length(max = 500))]
    pub admin_note: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub category_id: Option<Uuid>,
}
