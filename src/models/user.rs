use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::authz::{Permission, Role};
use crate::db::row_parsers::{parse_enum, parse_uuid};
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub full_name: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DbUser {
    pub fn role(&self) -> Result<Role, AppError> {
        parse_enum("users.role", &self.role)
    }

    pub fn uuid(&self) -> Result<Uuid, AppError> {
        parse_uuid("users.id", &self.id)
    }
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: value.uuid()?,
            role: value.role()?,
            full_name: value.full_name,
            username: value.username,
            email: value.email,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

pub const USER_COLUMNS: &str =
    "id, full_name, username, email, password_hash, role, refresh_token_hash, created_at, updated_at, deleted_at";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Siti Rahmawati")]
    pub full_name: String,
    #[validate(length(min = 3, max = 32), custom(function = "validate_username"))]
    #[schema(example = "siti")]
    pub username: String,
    #[validate(email)]
    #[schema(example = "siti@kampus.ac.id")]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    #[schema(example = "rahasia123")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    #[schema(example = "siti")]
    pub username: String,
    #[validate(length(min = 1))]
    #[schema(example = "rahasia123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Admin-side account creation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UserCreateRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 3, max = 32), custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UserUpdateRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<Role>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: User,
    pub permissions: Vec<Permission>,
}

fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        Ok(())
    } else {
        Err(validator::ValidationError::new("username_charset"))
    }
}
