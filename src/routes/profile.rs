use axum::extract::State;
use axum::Json;
use validator::Validate;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::CurrentUser;
use crate::models::user::{ChangePasswordRequest, ProfileResponse, ProfileUpdateRequest, User};
use crate::routes::auth::{ensure_email_available, fetch_user_by_id};
use crate::routes::MessageResponse;
use crate::utils::{hash_password, utc_now, verify_password};

#[utoipa::path(
    get,
    path = "/profile",
    tag = "Profile",
    responses(
        (status = 200, description = "Current user with effective permissions", body = ProfileResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
) -> AppResult<Json<ProfileResponse>> {
    let user: User = fetch_user_by_id(&state.pool, auth.id).await?.try_into()?;
    Ok(Json(ProfileResponse {
        user,
        permissions: auth.permissions,
    }))
}

#[utoipa::path(
    put,
    path = "/profile",
    tag = "Profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> AppResult<Json<User>> {
    payload.validate()?;
    if let Some(email) = payload.email.as_deref() {
        ensure_email_available(&state.pool, email, Some(auth.id)).await?;
    }

    sqlx::query(
        "UPDATE users SET full_name = COALESCE(?, full_name), email = COALESCE(?, email), updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&payload.full_name)
    .bind(&payload.email)
    .bind(utc_now())
    .bind(auth.id.to_string())
    .execute(&state.pool)
    .await?;

    let user: User = fetch_user_by_id(&state.pool, auth.id).await?.try_into()?;
    log_activity(&state.event_bus, "updated", Some(auth.id), &user);
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/profile/password",
    tag = "Profile",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password is wrong")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    payload.validate()?;

    let db_user = fetch_user_by_id(&state.pool, auth.id).await?;
    if !verify_password(&payload.current_password, &db_user.password_hash)? {
        return Err(AppError::bad_request("current password is incorrect"));
    }

    let password_hash = hash_password(&payload.new_password)?;
    // A new password ends existing refresh sessions.
    sqlx::query("UPDATE users SET password_hash = ?, refresh_token_hash = NULL, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(utc_now())
        .bind(auth.id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %auth.id, "password changed");
    Ok(Json(MessageResponse::new("Password changed")))
}
