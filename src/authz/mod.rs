//! Authorization - roles, permissions, route metadata and guards
//!
//! Access control is a flat list-membership check:
//! - every route carries `RouteAccess` (handler rule + controller rule) fixed at registration
//! - handler-level declarations override controller-level ones, no merging
//! - `RolesGuard` then `PermissionsGuard` compare the declaration with the request's
//!   `AuthenticatedUser`; any rejection is a 403 with the same message

mod guard;
mod metadata;
mod permission;
mod principal;
mod role;
mod table;

pub use guard::{authorize, enforce, ExecutionContext, Guard, PermissionsGuard, RolesGuard, GUARDS};
pub use metadata::{AccessRule, RouteAccess};
pub use permission::{flatten_permissions, Permission, PermissionArg, PermissionDomain, UnknownPermission};
pub use principal::AuthenticatedUser;
pub use role::{Role, UnknownRole};
pub use table::PermissionTable;
