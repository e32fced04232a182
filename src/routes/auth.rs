use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::{bearer_token, CurrentUser, TokenKind};
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest, User, USER_COLUMNS};
use crate::routes::MessageResponse;
use crate::utils::{hash_password, hash_token, utc_now, verify_password};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username or email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
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
    .bind(Role::User.as_str())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let user: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;
    log_activity(&state.event_bus, "registered", Some(user.id), &user);

    let response = issue_session(&state, user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate()?;

    let db_user = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ? AND deleted_at IS NULL"
    ))
    .bind(&payload.username)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::info!(username = %payload.username, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    Ok(Json(issue_session(&state, user).await?))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "New token pair; the presented refresh token is retired", body = AuthResponse),
        (status = 401, description = "Missing, invalid or already rotated refresh token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<AuthResponse>> {
    let token = bearer_token(&headers).ok_or_else(|| AppError::unauthorized("refresh token missing"))?;
    let claims = state.jwt.decode(token, TokenKind::Refresh)?;

    let db_user = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(claims.sub.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

    let presented = hash_token(token);
    if db_user.refresh_token_hash.as_deref() != Some(presented.as_str()) {
        tracing::warn!(user_id = %claims.sub, "refresh token reuse or revoked session");
        return Err(AppError::unauthorized("refresh token revoked"));
    }

    let user: User = db_user.try_into()?;
    Ok(Json(issue_session(&state, user).await?))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, CurrentUser(auth): CurrentUser) -> AppResult<Json<User>> {
    let user: User = fetch_user_by_id(&state.pool, auth.id).await?.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Refresh token revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn logout(State(state): State<AppState>, CurrentUser(auth): CurrentUser) -> AppResult<Json<MessageResponse>> {
    sqlx::query("UPDATE users SET refresh_token_hash = NULL, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(auth.id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(Json(MessageResponse::new("Logged out")))
}

/// Issues an access/refresh pair and stores the refresh digest, retiring any previous one.
async fn issue_session(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let pair = state.jwt.issue_pair(user.id, &user.username, user.role)?;

    sqlx::query("UPDATE users SET refresh_token_hash = ? WHERE id = ?")
        .bind(hash_token(&pair.refresh_token))
        .bind(user.id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user,
    })
}

pub(crate) async fn ensure_username_available(pool: &SqlitePool, username: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE username = ? AND deleted_at IS NULL")
        .bind(username)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("username already in use"));
    }

    Ok(())
}

/// `except` skips the account being updated.
pub(crate) async fn ensure_email_available(pool: &SqlitePool, email: &str, except: Option<Uuid>) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL AND (? IS NULL OR id <> ?)",
    )
    .bind(email)
    .bind(except.map(|id| id.to_string()))
    .bind(except.map(|id| id.to_string()))
    .fetch_one(pool)
    .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub(crate) async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))
}
