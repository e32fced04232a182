use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context for activity logging (IP, User-Agent)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

/// Publishes `<entity>.<action>` for an entity without previous state or request context.
pub fn log_activity<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<Uuid>, entity: &T) {
    log_activity_with_context(event_bus, action, actor_id, entity, None, None);
}

/// Publishes `<entity>.<action>` with optional previous state and request context.
///
/// Publishing never fails the request; with no listener the event is dropped.
pub fn log_activity_with_context<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
) {
    let event_name = format!("{}.{}", T::entity_type(), action);

    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        context,
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        event_name,
        actor_id,
        Some(entity.subject_id()),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    if event_bus.send(serde_json::to_value(event).unwrap_or_default()).is_err() {
        tracing::debug!("activity event dropped, no listener");
    }
}

pub fn describe(event_name: &str) -> &'static str {
    match event_name {
        "report.created" => "Laporan kehilangan dibuat",
        "report.updated" => "Laporan kehilangan diperbarui",
        "report.deleted" => "Laporan kehilangan dihapus",
        "report.audited" => "Status laporan diperbarui",
        "report.resolved" => "Laporan diselesaikan",
        "found_item.created" => "Barang temuan dicatat",
        "found_item.updated" => "Barang temuan diperbarui",
        "found_item.deleted" => "Barang temuan dihapus",
        "found_item.claimed" => "Barang temuan diklaim",
        "category.created" => "Kategori dibuat",
        "category.updated" => "Kategori diperbarui",
        "category.deleted" => "Kategori dihapus",
        "user.registered" => "Pengguna baru terdaftar",
        "user.created" => "Akun dibuat oleh admin",
        "user.updated" => "Akun diperbarui",
        "user.deleted" => "Akun dihapus",
        _ => "Aktivitas sistem",
    }
}

/// Projects bus events into `activity_log` until the bus closes.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(e) = record_event(&pool, &event).await {
            tracing::error!("failed to save activity log: {}", e);
        }
    }
    tracing::info!("activity listener stopped");
}

async fn record_event(pool: &SqlitePool, event: &Value) -> Result<(), sqlx::Error> {
    let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
    let actor_id = event
        .get("actor_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let subject_id = event
        .get("subject_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let occurred_at = event
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let severity = event
        .get("payload")
        .and_then(|p| p.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or(Severity::Important.as_str());

    sqlx::query(
        "INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(describe(name))
    .bind(actor_id.map(|u| u.to_string()))
    .bind(subject_id.map(|u| u.to_string()))
    .bind(occurred_at)
    .bind(event.to_string())
    .bind(severity)
    .execute(pool)
    .await?;

    Ok(())
}
