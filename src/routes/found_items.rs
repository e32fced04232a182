use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::authz::{Permission, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context, RequestContext};
use crate::jwt::CurrentUser;
use crate::models::found_item::{
    ClaimRequest, DbFoundItem, FoundItem, FoundItemCreateRequest, FoundItemQuery, FoundItemStatus,
    FoundItemUpdateRequest, FOUND_ITEM_COLUMNS,
};
use crate::models::report::{DbReport, Report, ReportStatus, REPORT_COLUMNS};
use crate::routes::categories::ensure_category_exists;
use crate::routes::reports::fetch_report;
use crate::routes::Controller;
use crate::utils::utc_now;
use crate::{permissions, roles};

pub fn router() -> Router<AppState> {
    Controller::new(roles!(Role::Admin, Role::User, Role::Petugas))
        .route("/", get(list_found_items), permissions!(Permission::ReadClaim))
        .route(
            "/",
            post(create_found_item),
            roles!(Role::Petugas, Role::Admin).and(permissions!(Permission::CreateClaim)),
        )
        .route("/:id", get(get_found_item), permissions!(Permission::ReadClaim))
        .route(
            "/:id",
            put(update_found_item),
            roles!(Role::Petugas, Role::Admin).and(permissions!(Permission::UpdateClaim)),
        )
        .route(
            "/:id",
            delete(delete_found_item),
            roles!(Role::Admin).and(permissions!(Permission::DeleteClaim)),
        )
        .route(
            "/:id/claim",
            patch(claim_found_item),
            roles!(Role::Petugas).and(permissions!(Permission::MarkClaimed)),
        )
        .into_router()
}

#[utoipa::path(
    get,
    path = "/found-items",
    tag = "Found Items",
    params(FoundItemQuery),
    responses((status = 200, description = "Found items, newest first", body = [FoundItem])),
    security(("bearerAuth" = []))
)]
pub async fn list_found_items(
    State(state): State<AppState>,
    Query(query): Query<FoundItemQuery>,
) -> AppResult<Json<Vec<FoundItem>>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {FOUND_ITEM_COLUMNS} FROM found_items WHERE deleted_at IS NULL"
    ));
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category_id) = query.category_id {
        qb.push(" AND category_id = ").push_bind(category_id.to_string());
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        qb.push(" AND item_name LIKE ")
            .push_bind(format!("%{}%", escape_like(q)))
            .push(" ESCAPE '\\'");
    }
    qb.push(" ORDER BY found_at DESC");

    let items = qb
        .build_query_as::<DbFoundItem>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(FoundItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/found-items",
    tag = "Found Items",
    request_body = FoundItemCreateRequest,
    responses(
        (status = 201, description = "Found item recorded as UNCLAIMED", body = FoundItem),
        (status = 403, description = "Izin tidak memadai")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_found_item(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(payload): Json<FoundItemCreateRequest>,
) -> AppResult<(StatusCode, Json<FoundItem>)> {
    payload.validate()?;
    ensure_category_exists(&state.pool, payload.category_id).await?;

    let now = utc_now();
    let item_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO found_items (id, category_id, item_name, description, found_location, found_at, storage_location, status, recorded_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(item_id.to_string())
    .bind(payload.category_id.map(|id| id.to_string()))
    .bind(&payload.item_name)
    .bind(&payload.description)
    .bind(&payload.found_location)
    .bind(payload.found_at)
    .bind(&payload.storage_location)
    .bind(FoundItemStatus::Unclaimed.as_str())
    .bind(auth.id.to_string())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let item: FoundItem = fetch_found_item(&state.pool, item_id).await?.try_into()?;
    log_activity(&state.event_bus, "created", Some(auth.id), &item);

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/found-items/{id}",
    tag = "Found Items",
    params(("id" = Uuid, Path, description = "Found item id")),
    responses(
        (status = 200, description = "Found item detail", body = FoundItem),
        (status = 404, description = "Found item not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_found_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<FoundItem>> {
    let item: FoundItem = fetch_found_item(&state.pool, id).await?.try_into()?;
    Ok(Json(item))
}

#[utoipa::path(
    put,
    path = "/found-items/{id}",
    tag = "Found Items",
    params(("id" = Uuid, Path, description = "Found item id")),
    request_body = FoundItemUpdateRequest,
    responses(
        (status = 200, description = "Found item updated", body = FoundItem),
        (status = 404, description = "Found item not found"),
        (status = 409, description = "Item already claimed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_found_item(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FoundItemUpdateRequest>,
) -> AppResult<Json<FoundItem>> {
    payload.validate()?;

    let before: FoundItem = fetch_found_item(&state.pool, id).await?.try_into()?;
    if before.is_claimed() {
        return Err(AppError::conflict("found item is already claimed"));
    }
    if payload.category_id.is_some() {
        ensure_category_exists(&state.pool, payload.category_id).await?;
    }

    let mut item = before.clone();
    if payload.category_id.is_some() {
        item.category_id = payload.category_id;
    }
    if let Some(item_name) = payload.item_name.as_ref() {
        item.item_name = item_name.clone();
    }
    if payload.description.is_some() {
        item.description = payload.description.clone();
    }
    if let Some(found_location) = payload.found_location.as_ref() {
        item.found_location = found_location.clone();
    }
    if let Some(found_at) = payload.found_at {
        item.found_at = found_at;
    }
    if payload.storage_location.is_some() {
        item.storage_location = payload.storage_location.clone();
    }

    write_unclaimed(&state.pool, &item).await?;

    let item: FoundItem = fetch_found_item(&state.pool, id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "updated", Some(auth.id), &item, Some(&before), None);

    Ok(Json(item))
}

#[utoipa::path(
    patch,
    path = "/found-items/{id}/claim",
    tag = "Found Items",
    params(("id" = Uuid, Path, description = "Found item id")),
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Item marked CLAIMED; the linked report is RESOLVED", body = FoundItem),
        (status = 400, description = "Unknown claimant or report"),
        (status = 404, description = "Found item not found"),
        (status = 409, description = "Item already claimed or report closed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn claim_found_item(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> AppResult<Json<FoundItem>> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;

    let before: FoundItem = sqlx::query_as::<_, DbFoundItem>(&format!(
        "SELECT {FOUND_ITEM_COLUMNS} FROM found_items WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("found item not found"))?
    .try_into()?;

    if before.is_claimed() {
        return Err(AppError::conflict("found item is already claimed"));
    }

    if let Some(claimant_id) = payload.claimant_user_id {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(claimant_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(AppError::bad_request(format!("unknown claimant {claimant_id}")));
        }
    }

    let linked_report: Option<Report> = match payload.report_id {
        Some(report_id) => {
            let report: Report = sqlx::query_as::<_, DbReport>(&format!(
                "SELECT {REPORT_COLUMNS} FROM reports WHERE id = ? AND deleted_at IS NULL"
            ))
            .bind(report_id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("unknown report {report_id}")))?
            .try_into()?;

            if !report.status.is_open() {
                return Err(AppError::conflict(format!(
                    "report is {} and can no longer be resolved",
                    report.status
                )));
            }
            Some(report)
        }
        None => None,
    };

    let now = utc_now();
    let claimed = sqlx::query(
        "UPDATE found_items SET status = ?, claimant_name = ?, claimant_user_id = ?, report_id = ?, claimed_at = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(FoundItemStatus::Claimed.as_str())
    .bind(payload.claimant_name.trim())
    .bind(payload.claimant_user_id.map(|id| id.to_string()))
    .bind(payload.report_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .bind(id.to_string())
    .bind(FoundItemStatus::Unclaimed.as_str())
    .execute(&mut *tx)
    .await?;

    // Lost a race with a concurrent claim.
    if claimed.rows_affected() != 1 {
        return Err(AppError::conflict("found item is already claimed"));
    }

    if let Some(report) = linked_report.as_ref() {
        sqlx::query("UPDATE reports SET status = ?, updated_at = ? WHERE id = ?")
            .bind(ReportStatus::Resolved.as_str())
            .bind(now)
            .bind(report.id.to_string())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let item: FoundItem = fetch_found_item(&state.pool, id).await?.try_into()?;
    let context = RequestContext::from_headers(&headers);
    log_activity_with_context(
        &state.event_bus,
        "claimed",
        Some(auth.id),
        &item,
        Some(&before),
        Some(context.clone()),
    );

    if let Some(old_report) = linked_report {
        let resolved: Report = fetch_report(&state.pool, old_report.id).await?.try_into()?;
        log_activity_with_context(
            &state.event_bus,
            "resolved",
            Some(auth.id),
            &resolved,
            Some(&old_report),
            Some(context),
        );
    }

    tracing::info!(found_item_id = %id, officer_id = %auth.id, "found item claimed");
    Ok(Json(item))
}

#[utoipa::path(
    delete,
    path = "/found-items/{id}",
    tag = "Found Items",
    params(("id" = Uuid, Path, description = "Found item id")),
    responses(
        (status = 204, description = "Found item soft deleted"),
        (status = 404, description = "Found item not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_found_item(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let item: FoundItem = fetch_found_item(&state.pool, id).await?.try_into()?;

    let now = utc_now();
    sqlx::query("UPDATE found_items SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(auth.id), &item);
    Ok(StatusCode::NO_CONTENT)
}

/// Writes the editable fields, only while the row is still UNCLAIMED.
async fn write_unclaimed(pool: &SqlitePool, item: &FoundItem) -> AppResult<()> {
    let updated = sqlx::query(
        "UPDATE found_items SET category_id = ?, item_name = ?, description = ?, found_location = ?, found_at = ?, storage_location = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(item.category_id.map(|id| id.to_string()))
    .bind(&item.item_name)
    .bind(&item.description)
    .bind(&item.found_location)
    .bind(item.found_at)
    .bind(&item.storage_location)
    .bind(utc_now())
    .bind(item.id.to_string())
    .bind(FoundItemStatus::Unclaimed.as_str())
    .execute(pool)
    .await?;

    // Claimed between the read and the write.
    if updated.rows_affected() != 1 {
        return Err(AppError::conflict("found item is already claimed"));
    }
    Ok(())
}

/// Escapes LIKE wildcards so `q` matches literally.
fn escape_like(q: &str) -> String {
    let mut escaped = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn fetch_found_item(pool: &SqlitePool, id: Uuid) -> AppResult<DbFoundItem> {
    sqlx::query_as::<_, DbFoundItem>(&format!(
        "SELECT {FOUND_ITEM_COLUMNS} FROM found_items WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("found item not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool_with_item(status: FoundItemStatus) -> anyhow::Result<(SqlitePool, FoundItem)> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!().run(&pool).await?;

        let now = utc_now();
        let officer = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, full_name, username, password_hash, role, created_at, updated_at) VALUES (?, 'Petugas', 'petugas', 'x', 'PETUGAS', ?, ?)",
        )
        .bind(&officer)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await?;

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO found_items (id, item_name, found_location, found_at, status, recorded_by, created_at, updated_at) VALUES (?, 'Helm', 'Parkiran', ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(now)
        .bind(status.as_str())
        .bind(&officer)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await?;

        let item = fetch_found_item(&pool, id).await?.try_into()?;
        Ok((pool, item))
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("kunci"), "kunci");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[tokio::test]
    async fn write_rejects_item_claimed_after_read() -> anyhow::Result<()> {
        let (pool, mut item) = pool_with_item(FoundItemStatus::Unclaimed).await?;
        item.storage_location = Some("Gudang".into());

        sqlx::query("UPDATE found_items SET status = 'CLAIMED' WHERE id = ?")
            .bind(item.id.to_string())
            .execute(&pool)
            .await?;

        assert!(matches!(write_unclaimed(&pool, &item).await, Err(AppError::Conflict(_))));
        let stored: FoundItem = fetch_found_item(&pool, item.id).await?.try_into()?;
        assert_eq!(stored.storage_location, None);
        Ok(())
    }

    #[tokio::test]
    async fn write_updates_unclaimed_item() -> anyhow::Result<()> {
        let (pool, mut item) = pool_with_item(FoundItemStatus::Unclaimed).await?;
        item.storage_location = Some("Gudang".into());

        write_unclaimed(&pool, &item).await?;
        let stored: FoundItem = fetch_found_item(&pool, item.id).await?.try_into()?;
        assert_eq!(stored.storage_location.as_deref(), Some("Gudang"));
        Ok(())
    }
}
