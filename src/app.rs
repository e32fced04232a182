use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::PermissionTable;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::{authenticate, JwtConfig};
use crate::routes::{activity, auth, categories, found_items, health, profile, reports, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub permissions: Arc<PermissionTable>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, permissions: PermissionTable, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            permissions: Arc::new(permissions),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let permissions = PermissionTable::load(&pool).await?;

    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, permissions, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    // Reachable without an access token; /auth/refresh reads its own refresh token.
    let public_routes = Router::new()
        .route("/api/health", get(health::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/profile/password", put(profile::change_password))
        .nest("/categories", categories::router())
        .nest("/users", users::router())
        .nest("/reports", reports::router())
        .nest("/found-items", found_items::router())
        .nest("/activity", activity::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
