use std::sync::Arc;

use axum::middleware;
use axum::routing::MethodRouter;
use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::{enforce, AccessRule, RouteAccess};

pub mod activity;
pub mod auth;
pub mod categories;
pub mod found_items;
pub mod health;
pub mod profile;
pub mod reports;
pub mod users;

/// A group of routes sharing a prefix and a controller-level access rule.
///
/// Every method route registered through [`Controller::route`] gets its own guard layer
/// carrying the `(handler, class)` rule pair, so guards never look anything up at runtime.
pub struct Controller {
    class: AccessRule,
    router: Router<AppState>,
}

impl Controller {
    pub fn new(class: AccessRule) -> Self {
        Self {
            class,
            router: Router::new(),
        }
    }

    /// Registers `method_router` at `path` guarded by `handler` over the controller rule.
    ///
    /// Registering the same path again merges the method routers, each keeping its own rule.
    pub fn route(mut self, path: &str, method_router: MethodRouter<AppState>, handler: AccessRule) -> Self {
        let access = Arc::new(RouteAccess::new(self.class.clone(), handler));
        let guarded = method_router.route_layer(middleware::from_fn_with_state(access, enforce));
        self.router = self.router.route(path, guarded);
        self
    }

    pub fn into_router(self) -> Router<AppState> {
        self.router
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
