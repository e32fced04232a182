#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use suka_kehilangan::create_app;
use suka_kehilangan::utils::hash_password;

pub const PASSWORD: &str = "rahasia123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Keeps the database file alive for the duration of the test.
    _dir: TempDir,
}

pub async fn migrated_pool() -> Result<(SqlitePool, TempDir)> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

pub async fn spawn_app() -> Result<TestApp> {
    let (pool, dir) = migrated_pool().await?;
    app_for(pool, dir).await
}

/// Builds the router over an already prepared database.
pub async fn app_for(pool: SqlitePool, dir: TempDir) -> Result<TestApp> {
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        Ok((status, value))
    }

    /// Registers a USER and returns its auth response.
    pub async fn register(&self, username: &str) -> Result<Value> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "full_name": format!("User {}", username),
                    "username": username,
                    "email": format!("{}@kampus.ac.id", username),
                    "password": PASSWORD
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        Ok(body)
    }

    pub async fn login(&self, username: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        Ok(body["access_token"].as_str().context("missing access_token")?.to_string())
    }

    /// Inserts an account with the given role directly and logs it in.
    pub async fn staff(&self, username: &str, role: &str) -> Result<String> {
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO users (id, full_name, username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(format!("Staff {}", username))
        .bind(username)
        .bind(hash_password(PASSWORD)?)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.login(username).await
    }

    pub async fn user_token(&self, username: &str) -> Result<String> {
        let body = self.register(username).await?;
        Ok(body["access_token"].as_str().context("missing access_token")?.to_string())
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap_or_default().to_string()
}
