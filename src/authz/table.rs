use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use super::{Permission, Role};
use crate::errors::AppError;

/// Immutable role -> permission mapping, loaded once at startup and shared through `AppState`.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    grants: HashMap<Role, Vec<Permission>>,
}

impl PermissionTable {
    /// Built-in seed data.
    pub fn builtin() -> Self {
        use Permission::*;

        let mut grants = HashMap::new();
        grants.insert(Role::Admin, Permission::ALL.to_vec());
        grants.insert(
            Role::Petugas,
            vec![ReadReport, CreateClaim, ReadClaim, UpdateClaim, MarkClaimed, ReadCategory],
        );
        grants.insert(
            Role::User,
            vec![CreateReport, ReadReport, UpdateReport, DeleteReport, ReadClaim, ReadCategory],
        );
        Self { grants }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Role, Permission)>) -> Self {
        let mut grants: HashMap<Role, Vec<Permission>> = HashMap::new();
        for (role, permission) in pairs {
            let entry = grants.entry(role).or_default();
            if !entry.contains(&permission) {
                entry.push(permission);
            }
        }
        Self { grants }
    }

    /// Loads the seeded `role_permissions` rows, falling back to the built-in table on an unseeded database.
    pub async fn load(pool: &SqlitePool) -> Result<Self, AppError> {
        let rows = sqlx::query("SELECT role, permission FROM role_permissions ORDER BY role, permission")
            .fetch_all(pool)
            .await?;

        if rows.is_empty() {
            tracing::info!("role_permissions is empty, using built-in permission table");
            return Ok(Self::builtin());
        }

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            let permission: String = row.try_get("permission")?;
            let role = role
                .parse::<Role>()
                .map_err(|e| AppError::internal(e.to_string()))?;
            match permission.parse::<Permission>() {
                Ok(permission) => pairs.push((role, permission)),
                Err(e) => tracing::warn!(%role, error = %e, "skipping unknown permission row"),
            }
        }

        let table = Self::from_pairs(pairs);
        tracing::info!(roles = table.grants.len(), "permission table loaded");
        Ok(table)
    }

    pub fn permissions_for(&self, role: Role) -> &[Permission] {
        self.grants.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        self.permissions_for(role).contains(&permission)
    }

    /// Flat `(role, permission)` rows, as written by the seeder.
    pub fn rows(&self) -> Vec<(Role, Permission)> {
        let mut rows = Vec::new();
        for role in Role::ALL {
            for permission in self.permissions_for(role) {
                rows.push((role, *permission));
            }
        }
        rows
    }
}
