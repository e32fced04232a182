//! Reference data: role permissions, default categories and the staff accounts.
//!
//! Every step checks for existing rows first, so running it again inserts nothing.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{PermissionTable, Role};
use crate::errors::AppError;
use crate::utils::{hash_password, utc_now};

pub const DEFAULT_CATEGORIES: [(&str, &str); 8] = [
    ("Elektronik", "Ponsel, laptop, charger, earphone"),
    ("Dokumen", "KTM, KTP, SIM, berkas"),
    ("Dompet & Tas", "Dompet, tas, ransel"),
    ("Kunci", "Kunci motor, kunci kos, kunci loker"),
    ("Pakaian", "Jaket, topi, sepatu"),
    ("Aksesoris", "Jam tangan, kacamata, perhiasan"),
    ("Buku & Alat Tulis", "Buku, catatan, alat tulis"),
    ("Lainnya", "Barang yang tidak masuk kategori lain"),
];

#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    pub admin_password: Option<String>,
    pub petugas_password: Option<String>,
}

impl SeedOptions {
    pub fn from_env() -> Self {
        Self {
            admin_password: std::env::var("SEED_ADMIN_PASSWORD").ok(),
            petugas_password: std::env::var("SEED_PETUGAS_PASSWORD").ok(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_inserted: u64,
    pub categories_inserted: u64,
    pub users_created: Vec<String>,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.permissions_inserted == 0 && self.categories_inserted == 0 && self.users_created.is_empty()
    }
}

pub async fn run(pool: &SqlitePool, options: &SeedOptions) -> Result<SeedReport, AppError> {
    let mut report = SeedReport::default();
    let mut tx = pool.begin().await?;

    for (role, permission) in PermissionTable::builtin().rows() {
        let result = sqlx::query("INSERT OR IGNORE INTO role_permissions (role, permission) VALUES (?, ?)")
            .bind(role.as_str())
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await?;
        report.permissions_inserted += result.rows_affected();
    }

    for (name, description) in DEFAULT_CATEGORIES {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM categories WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
        if exists > 0 {
            continue;
        }

        let now = utc_now();
        sqlx::query("INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(description)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        report.categories_inserted += 1;
    }

    let staff = [
        ("admin", "Administrator", Role::Admin, options.admin_password.as_deref()),
        ("petugas", "Petugas Keamanan", Role::Petugas, options.petugas_password.as_deref()),
    ];

    for (username, full_name, role, password) in staff {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE username = ? AND deleted_at IS NULL")
            .bind(username)
            .fetch_one(&mut *tx)
            .await?;
        if exists > 0 {
            continue;
        }

        let Some(password) = password else {
            tracing::warn!(username, %role, "no seed password configured, account skipped");
            continue;
        };

        let now = utc_now();
        sqlx::query(
            "INSERT INTO users (id, full_name, username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(full_name)
        .bind(username)
        .bind(hash_password(password)?)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        report.users_created.push(username.to_string());
    }

    tx.commit().await?;

    tracing::info!(
        permissions = report.permissions_inserted,
        categories = report.categories_inserted,
        users = ?report.users_created,
        "seed finished"
    );
    Ok(report)
}
