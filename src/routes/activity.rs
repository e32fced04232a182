use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use sqlx::{QueryBuilder, Sqlite};

use crate::app::AppState;
use crate::authz::{Permission, Role};
use crate::errors::AppResult;
use crate::models::activity::{ActivityEntry, ActivityQuery, DbActivityEntry};
use crate::routes::Controller;
use crate::{permissions, roles};

pub fn router() -> Router<AppState> {
    Controller::new(roles!(Role::Admin))
        .route("/", get(list_activity), permissions!(Permission::ReadActivity))
        .into_router()
}

#[utoipa::path(
    get,
    path = "/activity",
    tag = "Activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Newest activity log entries", body = [ActivityEntry]),
        (status = 403, description = "Izin tidak memadai")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, event_name, description, actor_id, subject_id, occurred_at, properties, severity FROM activity_log WHERE 1 = 1",
    );
    if let Some(event_name) = query.event_name.as_deref() {
        qb.push(" AND event_name = ").push_bind(event_name);
    }
    qb.push(" ORDER BY occurred_at DESC LIMIT ").push_bind(query.effective_limit());

    let entries = qb
        .build_query_as::<DbActivityEntry>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(ActivityEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(entries))
}
