use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::authz::{AuthenticatedUser, Permission, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context, RequestContext};
use crate::jwt::CurrentUser;
use crate::models::report::{
    DbReport, Report, ReportCreateRequest, ReportQuery, ReportStatus, ReportStatusRequest, ReportUpdateRequest,
    REPORT_COLUMNS,
};
use crate::routes::categories::ensure_category_exists;
use crate::routes::Controller;
use crate::utils::utc_now;
use crate::{permissions, roles};

pub fn router() -> Router<AppState> {
    Controller::new(roles!(Role::Admin, Role::User, Role::Petugas))
        .route("/", get(list_reports), permissions!(Permission::ReadReport))
        .route(
            "/",
            post(create_report),
            roles!(Role::User).and(permissions!(Permission::CreateReport)),
        )
        .route("/:id", get(get_report), permissions!(Permission::ReadReport))
        .route(
            "/:id",
            put(update_report),
            roles!(Role::User, Role::Admin).and(permissions!(Permission::UpdateReport)),
        )
        .route(
            "/:id",
            delete(delete_report),
            roles!(Role::User, Role::Admin).and(permissions!(Permission::DeleteReport)),
        )
        .route(
            "/:id/status",
            patch(audit_report),
            roles!(Role::Admin).and(permissions!(Permission::AuditReport)),
        )
        .into_router()
}

#[utoipa::path(
    get,
    path = "/reports",
    tag = "Reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Reports visible to the caller, newest first", body = [Report]),
        (status = 403, description = "Izin tidak memadai")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Vec<Report>>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {REPORT_COLUMNS} FROM reports WHERE deleted_at IS NULL"));

    // A USER only ever sees their own reports.
    if auth.role == Role::User {
        qb.push(" AND user_id = ").push_bind(auth.id.to_string());
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category_id) = query.category_id {
        qb.push(" AND category_id = ").push_bind(category_id.to_string());
    }
    qb.push(" ORDER BY created_at DESC");

    let reports = qb
        .build_query_as::<DbReport>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(Report::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(reports))
}

#[utoipa::path(
    post,
    path = "/reports",
    tag = "Reports",
    request_body = ReportCreateRequest,
    responses(
        (status = 201, description = "Report filed as PENDING", body = Report),
        (status = 400, description = "Validation failed or unknown category"),
        (status = 403, description = "Izin tidak memadai")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(payload): Json<ReportCreateRequest>,
) -> AppResult<(StatusCode, Json<Report>)> {
    payload.validate()?;
    ensure_category_exists(&state.pool, payload.category_id).await?;

    let now = utc_now();
    let report_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO reports (id, user_id, category_id, item_name, description, lost_location, lost_at, contact, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(report_id.to_string())
    .bind(auth.id.to_string())
    .bind(payload.category_id.map(|id| id.to_string()))
    .bind(&payload.item_name)
    .bind(&payload.description)
    .bind(&payload.lost_location)
    .bind(payload.lost_at)
    .bind(&payload.contact)
    .bind(ReportStatus::Pending.as_str())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let report: Report = fetch_report(&state.pool, report_id).await?.try_into()?;
    log_activity(&state.event_bus, "created", Some(auth.id), &report);

    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report detail", body = Report),
        (status = 404, description = "Report not found or not visible")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Report>> {
    let report: Report = fetch_report(&state.pool, id).await?.try_into()?;
    ensure_visible(&auth, &report)?;
    Ok(Json(report))
}

#[utoipa::path(
    put,
    path = "/reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    request_body = ReportUpdateRequest,
    responses(
        (status = 200, description = "Report updated", body = Report),
        (status = 404, description = "Report not found or not visible"),
        (status = 409, description = "Report is no longer PENDING")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportUpdateRequest>,
) -> AppResult<Json<Report>> {
    payload.validate()?;

    let before: Report = fetch_report(&state.pool, id).await?.try_into()?;
    ensure_editable(&auth, &before)?;
    if payload.category_id.is_some() {
        ensure_category_exists(&state.pool, payload.category_id).await?;
    }

    let mut report = before.clone();
    if payload.category_id.is_some() {
        report.category_id = payload.category_id;
    }
    if let Some(item_name) = payload.item_name.as_ref() {
        report.item_name = item_name.clone();
    }
    if payload.description.is_some() {
        report.description = payload.description.clone();
    }
    if let Some(lost_location) = payload.lost_location.as_ref() {
        report.lost_location = lost_location.clone();
    }
    if let Some(lost_at) = payload.lost_at {
        report.lost_at = lost_at;
    }
    if payload.contact.is_some() {
        report.contact = payload.contact.clone();
    }

    sqlx::query(
        "UPDATE reports SET category_id = ?, item_name = ?, description = ?, lost_location = ?, lost_at = ?, contact = ?, updated_at = ? WHERE id = ?",
    )
    .bind(report.category_id.map(|id| id.to_string()))
    .bind(&report.item_name)
    .bind(&report.description)
    .bind(&report.lost_location)
    .bind(report.lost_at)
    .bind(&report.contact)
    .bind(utc_now())
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    let report: Report = fetch_report(&state.pool, id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "updated", Some(auth.id), &report, Some(&before), None);

    Ok(Json(report))
}

#[utoipa::path(
    delete,
    path = "/reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    responses(
        (status = 204, description = "Report soft deleted"),
        (status = 404, description = "Report not found or not visible"),
        (status = 409, description = "Report is no longer PENDING")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let report: Report = fetch_report(&state.pool, id).await?.try_into()?;
    ensure_editable(&auth, &report)?;

    let now = utc_now();
    sqlx::query("UPDATE reports SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(auth.id), &report);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/reports/{id}/status",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report id")),
    request_body = ReportStatusRequest,
    responses(
        (status = 200, description = "Report audited", body = Report),
        (status = 404, description = "Report not found"),
        (status = 409, description = "Status transition not allowed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn audit_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportStatusRequest>,
) -> AppResult<Json<Report>> {
    payload.validate()?;

    let before: Report = fetch_report(&state.pool, id).await?.try_into()?;
    if !before.status.can_transition_to(payload.status) {
        return Err(AppError::conflict(format!(
            "cannot change report status from {} to {}",
            before.status, payload.status
        )));
    }

    let admin_note = payload.admin_note.clone().or_else(|| before.admin_note.clone());
    sqlx::query("UPDATE reports SET status = ?, admin_note = ?, updated_at = ? WHERE id = ?")
        .bind(payload.status.as_str())
        .bind(&admin_note)
        .bind(utc_now())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    let report: Report = fetch_report(&state.pool, id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "audited",
        Some(auth.id),
        &report,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(report))
}

/// Non-owners get 404 for reports a USER may not see.
fn ensure_visible(auth: &AuthenticatedUser, report: &Report) -> AppResult<()> {
    if auth.role == Role::User && report.user_id != auth.id {
        return Err(AppError::not_found("report not found"));
    }
    Ok(())
}

/// A USER edits only their own reports and only while PENDING; ADMIN edits any.
fn ensure_editable(auth: &AuthenticatedUser, report: &Report) -> AppResult<()> {
    if auth.is_admin() {
        return Ok(());
    }
    ensure_visible(auth, report)?;
    if report.status != ReportStatus::Pending {
        return Err(AppError::conflict("report can only be changed while PENDING"));
    }
    Ok(())
}

pub(crate) async fn fetch_report(pool: &SqlitePool, id: Uuid) -> AppResult<DbReport> {
    sqlx::query_as::<_, DbReport>(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("report not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn report(owner: Uuid, status: ReportStatus) -> Report {
        let now = Utc::now();
        Report {
            id: Uuid::new_v4(),
            user_id: owner,
            category_id: None,
            item_name: "Dompet".to_string(),
            description: None,
            lost_location: "Kantin".to_string(),
            lost_at: now,
            contact: None,
            status,
            admin_note: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn users_cannot_see_or_edit_foreign_reports() {
        let me = AuthenticatedUser::new(Uuid::new_v4(), "Siti", "siti", Role::User);
        let other = report(Uuid::new_v4(), ReportStatus::Pending);
        assert!(matches!(ensure_visible(&me, &other), Err(AppError::NotFound(_))));
        assert!(matches!(ensure_editable(&me, &other), Err(AppError::NotFound(_))));
    }

    #[test]
    fn owners_edit_only_pending_reports() {
        let me = AuthenticatedUser::new(Uuid::new_v4(), "Siti", "siti", Role::User);
        assert!(ensure_editable(&me, &report(me.id, ReportStatus::Pending)).is_ok());
        assert!(matches!(
            ensure_editable(&me, &report(me.id, ReportStatus::Verified)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn admins_and_officers_see_everything() {
        let admin = AuthenticatedUser::new(Uuid::new_v4(), "Admin", "admin", Role::Admin);
        let officer = AuthenticatedUser::new(Uuid::new_v4(), "Petugas", "petugas", Role::Petugas);
        let resolved = report(Uuid::new_v4(), ReportStatus::Resolved);
        assert!(ensure_visible(&officer, &resolved).is_ok());
        assert!(ensure_editable(&admin, &resolved).is_ok());
    }
}
