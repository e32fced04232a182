use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::metadata::RouteAccess;
use super::principal::AuthenticatedUser;
use crate::errors::AppError;

/// What a guard sees: the matched route's metadata and the request's user, if any.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub access: &'a RouteAccess,
    pub user: Option<&'a AuthenticatedUser>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(access: &'a RouteAccess, user: Option<&'a AuthenticatedUser>) -> Self {
        Self { access, user }
    }
}

/// A request-pipeline check run before the handler.
pub trait Guard: Send + Sync {
    fn can_activate(&self, ctx: &ExecutionContext<'_>) -> Result<(), AppError>;
}

/// Allows when no roles are required, otherwise when the user's role is listed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolesGuard;

impl Guard for RolesGuard {
    fn can_activate(&self, ctx: &ExecutionContext<'_>) -> Result<(), AppError> {
        let required = match ctx.access.required_roles() {
            Some(required) if !required.is_empty() => required,
            _ => return Ok(()),
        };

        let Some(user) = ctx.user else {
            tracing::debug!(?required, "role check without authenticated user");
            return Err(AppError::access_denied());
        };

        if required.contains(&user.role) {
            return Ok(());
        }

        tracing::debug!(
            user_id = %user.id,
            role = %user.role,
            ?required,
            "role not permitted"
        );
        Err(AppError::access_denied())
    }
}

/// Allows when no permissions are required, otherwise when the user holds any of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionsGuard;

impl Guard for PermissionsGuard {
    fn can_activate(&self, ctx: &ExecutionContext<'_>) -> Result<(), AppError> {
        let required = match ctx.access.required_permissions() {
            Some(required) if !required.is_empty() => required,
            _ => return Ok(()),
        };

        let Some(user) = ctx.user else {
            tracing::debug!(?required, "permission check without authenticated user");
            return Err(AppError::access_denied());
        };

        if user.has_any_permission(required) {
            return Ok(());
        }

        tracing::debug!(
            user_id = %user.id,
            role = %user.role,
            ?required,
            "permission not held"
        );
        Err(AppError::access_denied())
    }
}

/// Guards in evaluation order.
pub const GUARDS: [&dyn Guard; 2] = [&RolesGuard, &PermissionsGuard];

/// Runs every guard against the context, stopping at the first rejection.
pub fn authorize(ctx: &ExecutionContext<'_>) -> Result<(), AppError> {
    for guard in GUARDS {
        guard.can_activate(ctx)?;
    }
    Ok(())
}

/// Route layer installed by `Controller::route` for each handler.
pub async fn enforce(
    State(access): State<Arc<RouteAccess>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    {
        let user = req.extensions().get::<AuthenticatedUser>();
        authorize(&ExecutionContext::new(&access, user))?;
    }
    Ok(next.run(req).await)
}
