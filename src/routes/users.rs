use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::authz::{Permission, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context};
use crate::jwt::CurrentUser;
use crate::models::user::{DbUser, User, UserCreateRequest, UserQuery, UserUpdateRequest, USER_COLUMNS};
use crate::routes::auth::{ensure_email_available, ensure_username_available, fetch_user_by_id};
use crate::routes::Controller;
use crate::utils::{hash_password, utc_now};
use crate::{permissions, roles};

/// Account administration, ADMIN only.
pub fn router() -> Router<AppState> {
    Controller::new(roles!(Role::Admin))
        .route("/", get(list_users), permissions!(Permission::ReadAccount))
        .route("/", post(create_user), permissions!(Permission::CreateAccount))
        .route("/:id", get(get_user), permissions!(Permission::ReadAccount))
        .route("/:id", put(update_user), permissions!(Permission::UpdateAccount))
        .route("/:id", delete(delete_user), permissions!(Permission::DeleteAccount))
        .into_router()
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(UserQuery),
    responses(
        (status = 200, description = "List live accounts", body = [User]),
        (status = 403, description = "Izin tidak memadai")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, Query(query): Query<UserQuery>) -> AppResult<Json<Vec<User>>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL"));
    if let Some(role) = query.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    qb.push(" ORDER BY created_at ASC");

    let users = qb
        .build_query_as::<DbUser>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 409, description = "Username or email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    payload.validate()?;
    ensure_username_available(&state.pool, &payload.username).await?;
    if let Some(email) = payload.email.as_deref() {
        ensure_email_available(&state.pool, email, None).await?;
    }

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, full_name, username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(&payload.full_name)
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(payload.role.as_str())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let user: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;
    log_activity(&state.event_bus, "created", Some(auth.id), &user);

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account detail", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    let user: User = fetch_user_by_id(&state.pool, id).await?.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Account updated", body = User),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    payload.validate()?;

    let mut db_user = fetch_user_by_id(&state.pool, id).await?;
    let before: User = db_user.clone().try_into()?;

    if let Some(email) = payload.email.as_deref() {
        ensure_email_available(&state.pool, email, Some(id)).await?;
        db_user.email = Some(email.to_string());
    }
    if let Some(full_name) = payload.full_name.as_ref() {
        db_user.full_name = full_name.clone();
    }
    if let Some(role) = payload.role {
        db_user.role = role.as_str().to_string();
    }
    if let Some(password) = payload.password.as_deref() {
        db_user.password_hash = hash_password(password)?;
    }

    // A role or password change ends existing sessions.
    let revoke_sessions = payload.role.is_some_and(|r| r != before.role) || payload.password.is_some();
    if revoke_sessions {
        db_user.refresh_token_hash = None;
    }

    sqlx::query(
        "UPDATE users SET full_name = ?, email = ?, role = ?, password_hash = ?, refresh_token_hash = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&db_user.full_name)
    .bind(&db_user.email)
    .bind(&db_user.role)
    .bind(&db_user.password_hash)
    .bind(&db_user.refresh_token_hash)
    .bind(utc_now())
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    let user: User = fetch_user_by_id(&state.pool, id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "updated", Some(auth.id), &user, Some(&before), None);

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account soft deleted"),
        (status = 400, description = "An admin cannot delete their own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if id == auth.id {
        return Err(AppError::bad_request("cannot delete your own account"));
    }

    let user: User = fetch_user_by_id(&state.pool, id).await?.try_into()?;

    sqlx::query("UPDATE users SET deleted_at = ?, refresh_token_hash = NULL, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(utc_now())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(auth.id), &user);
    Ok(StatusCode::NO_CONTENT)
}
