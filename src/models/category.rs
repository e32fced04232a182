use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::row_parsers::parse_uuid;
use crate::errors::AppError;
use crate::events::Loggable;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Category {
    fn entity_type() -> &'static str { "category" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCategory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCategory> for Category {
    type Error = AppError;

    fn try_from(value: DbCategory) -> Result<Self, Self::Error> {
        Ok(Category {
            id: parse_uuid("categories.id", &value.id)?,
            name: value.name,
            description: value.description,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryCreateRequest {
    #[validate(length(min = 1, max = 60))]
    #[schema(example = "Elektronik")]
    pub name: String,
    #[validate(length(max = 255))]
    #[schema(example = "Ponsel, laptop, charger")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryUpdateRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}
