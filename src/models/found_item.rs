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

/// `UNCLAIMED -> CLAIMED`, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FoundItemStatus {
    Unclaimed,
    Claimed,
}

impl FoundItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoundItemStatus::Unclaimed => "UNCLAIMED",
            FoundItemStatus::Claimed => "CLAIMED",
        }
    }
}

impl fmt::Display for FoundItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FoundItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNCLAIMED" => Ok(FoundItemStatus::Unclaimed),
            "CLAIMED" => Ok(FoundItemStatus::Claimed),
            other => Err(format!("unknown found item status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FoundItem {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub item_name: String,
    pub description: Option<String>,
    pub found_location: String,
    #[schema(example = "2025-09-01T10:00:00Z")]
    pub found_at: DateTime<Utc>,
    pub storage_location: Option<String>,
    pub status: FoundItemStatus,
    pub recorded_by: Uuid,
    pub claimant_name: Option<String>,
    pub claimant_user_id: Option<Uuid>,
    pub report_id: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FoundItem {
    pub fn is_claimed(&self) -> bool {
        self.status == FoundItemStatus::Claimed
    }
}

impl Loggable for FoundItem {
    fn entity_type() -> &'static str { "found_item" }
    fn subject_id(&self) -> Uuid { self.id }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "claimed" => Severity::Critical,
            _ => self.severity(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbFoundItem {
    pub id: String,
    pub category_id: Option<String>,
    pub item_name: String,
    pub description: Option<String>,
    pub found_location: String,
    pub found_at: DateTime<Utc>,
    pub storage_location: Option<String>,
    pub status: String,
    pub recorded_by: String,
    pub claimant_name: Option<String>,
    pub claimant_user_id: Option<String>,
    pub report_id: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub const FOUND_ITEM_COLUMNS: &str = "id, category_id, item_name, description, found_location, found_at, storage_location, status, recorded_by, claimant_name, claimant_user_id, report_id, claimed_at, created_at, updated_at, deleted_at";

impl TryFrom<DbFoundItem> for FoundItem {
    type Error = AppError;

    fn try_from(value: DbFoundItem) -> Result<Self, Self::Error> {
        Ok(FoundItem {
            id: parse_uuid("found_items.id", &value.id)?,
            category_id: parse_opt_uuid("found_items.category_id", value.category_id.as_deref())?,
            status: parse_enum("found_items.status", &value.status)?,
            recorded_by: parse_uuid("found_items.recorded_by", &value.recorded_by)?,
            claimant_user_id: parse_opt_uuid("found_items.claimant_user_id", value.claimant_user_id.as_deref())?,
            report_id: parse_opt_uuid("found_items.report_id", value.report_id.as_deref())?,
            item_name: value.item_name,
            description: value.description,
            found_location: value.found_location,
            found_at: value.found_at,
            storage_location: value.storage_location,
            claimant_name: value.claimant_name,
            claimed_at: value.claimed_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct FoundItemCreateRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    #[schema(example = "Kunci motor dengan gantungan biru")]
    pub item_name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Parkiran gedung B")]
    pub found_location: String,
    pub found_at: DateTime<Utc>,
    #[validate(length(max = 200))]
    #[schema(example = "Pos satpam utama, loker 3")]
    pub storage_location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct FoundItemUpdateRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub item_name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub found_location: Option<String>,
    pub found_at: Option<DateTime<Utc>>,
    #[validate(length(max = 200))]
    pub storage_location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClaimRequest {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Andi Pratama")]
    pub claimant_name: String,
    pub claimant_user_id: Option<Uuid>,
    /// Report to resolve with this claim.
    pub report_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FoundItemQuery {
    pub status: Option<FoundItemStatus>,
    pub category_id: Option<Uuid>,
    /// Substring match on the item name.
    pub q: Option<String>,
}
