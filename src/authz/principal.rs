use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use super::{Permission, Role};

/// The request's authenticated identity, attached by the authentication layer.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl AuthenticatedUser {
    pub fn new(id: Uuid, full_name: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            username: username.into(),
            role,
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, perms: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = perms.into_iter().collect();
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn has_any_permission(&self, required: &[Permission]) -> bool {
        let held: HashSet<&Permission> = self.permissions.iter().collect();
        required.iter().any(|p| held.contains(p))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}
