use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::authz::{AccessRule, Permission, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context};
use crate::jwt::CurrentUser;
use crate::models::category::{Category, CategoryCreateRequest, CategoryUpdateRequest, DbCategory};
use crate::routes::Controller;
use crate::utils::utc_now;
use crate::{permissions, roles};

const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Master data: every role reads, only ADMIN manages.
pub fn router() -> Router<AppState> {
    let manage = || roles!(Role::Admin).and(permissions!(Permission::ManageCategory));

    Controller::new(
        roles!(Role::Admin, Role::User, Role::Petugas).and(permissions!(Permission::ReadCategory)),
    )
    .route("/", get(list_categories), AccessRule::none())
    .route("/", post(create_category), manage())
    .route("/:id", get(get_category), AccessRule::none())
    .route("/:id", put(update_category), manage())
    .route("/:id", delete(delete_category), manage())
    .into_router()
}

#[utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    responses((status = 200, description = "Categories ordered by name", body = [Category])),
    security(("bearerAuth" = []))
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    let categories = sqlx::query_as::<_, DbCategory>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC"
    ))
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .map(Category::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(categories))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category detail", body = Category),
        (status = 404, description = "Category not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Category>> {
    let category: Category = fetch_category(&state.pool, id).await?.try_into()?;
    Ok(Json(category))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "Categories",
    request_body = CategoryCreateRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 409, description = "Category name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(payload): Json<CategoryCreateRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    payload.validate()?;
    ensure_name_available(&state.pool, &payload.name, None).await?;

    let now = utc_now();
    let category_id = Uuid::new_v4();

    sqlx::query("INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(category_id.to_string())
        .bind(payload.name.trim())
        .bind(&payload.description)
        .bind(now)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let category: Category = fetch_category(&state.pool, category_id).await?.try_into()?;
    log_activity(&state.event_bus, "created", Some(auth.id), &category);

    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryUpdateRequest,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_category(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryUpdateRequest>,
) -> AppResult<Json<Category>> {
    payload.validate()?;

    let mut category = fetch_category(&state.pool, id).await?;
    let before: Category = category.clone().try_into()?;

    if let Some(name) = payload.name.as_deref() {
        ensure_name_available(&state.pool, name, Some(id)).await?;
        category.name = name.trim().to_string();
    }
    if payload.description.is_some() {
        category.description = payload.description.clone();
    }

    sqlx::query("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&category.name)
        .bind(&category.description)
        .bind(utc_now())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    let category: Category = fetch_category(&state.pool, id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "updated", Some(auth.id), &category, Some(&before), None);

    Ok(Json(category))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category is still used by a report or found item")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let category: Category = fetch_category(&state.pool, id).await?.try_into()?;

    let in_use: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(1) FROM reports WHERE category_id = ? AND deleted_at IS NULL) + (SELECT COUNT(1) FROM found_items WHERE category_id = ? AND deleted_at IS NULL)",
    )
    .bind(id.to_string())
    .bind(id.to_string())
    .fetch_one(&state.pool)
    .await?;

    if in_use > 0 {
        return Err(AppError::conflict("category is still in use"));
    }

    let mut tx = state.pool.begin().await?;
    // Soft-deleted rows keep their history but drop the reference.
    sqlx::query("UPDATE reports SET category_id = NULL WHERE category_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE found_items SET category_id = NULL WHERE category_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log_activity(&state.event_bus, "deleted", Some(auth.id), &category);
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_name_available(pool: &SqlitePool, name: &str, except: Option<Uuid>) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM categories WHERE lower(name) = lower(?) AND (? IS NULL OR id <> ?)",
    )
    .bind(name.trim())
    .bind(except.map(|id| id.to_string()))
    .bind(except.map(|id| id.to_string()))
    .fetch_one(pool)
    .await?;

    if count > 0 {
        return Err(AppError::conflict("category name already exists"));
    }

    Ok(())
}

/// 400 when a referenced category does not exist.
pub(crate) async fn ensure_category_exists(pool: &SqlitePool, id: Option<Uuid>) -> AppResult<()> {
    let Some(id) = id else {
        return Ok(());
    };

    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM categories WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::bad_request(format!("unknown category {id}")));
    }

    Ok(())
}

async fn fetch_category(pool: &SqlitePool, id: Uuid) -> AppResult<DbCategory> {
    sqlx::query_as::<_, DbCategory>(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("category not found"))
}
