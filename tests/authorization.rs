mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

fn assert_denied(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
    assert_eq!(body["message"], "Izin tidak memadai");
}

#[tokio::test]
async fn anonymous_requests_to_guarded_routes_are_denied() -> Result<()> {
    let t = common::spawn_app().await?;

    for uri in ["/categories", "/reports", "/found-items", "/users", "/activity"] {
        let (status, body) = t.send("GET", uri, None, None).await?;
        assert_denied(status, &body);
    }

    Ok(())
}

#[tokio::test]
async fn handler_rule_overrides_class_rule() -> Result<()> {
    let t = common::spawn_app().await?;
    let user = t.user_token("siti").await?;
    let admin = t.staff("admin", "ADMIN").await?;

    // class rule lets USER read categories
    let (status, _) = t.send("GET", "/categories", Some(&user), None).await?;
    assert_eq!(status, StatusCode::OK);

    // handler rule restricts creation to ADMIN
    let payload = json!({"name": "Elektronik"});
    let (status, body) = t.send("POST", "/categories", Some(&user), Some(payload.clone())).await?;
    assert_denied(status, &body);
    let (status, _) = t.send("POST", "/categories", Some(&admin), Some(payload)).await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn roles_are_checked_per_verb() -> Result<()> {
    let t = common::spawn_app().await?;
    let user = t.user_token("siti").await?;
    let petugas = t.staff("petugas", "PETUGAS").await?;
    let admin = t.staff("admin", "ADMIN").await?;

    // only USER files reports
    let report = json!({
        "item_name": "Dompet coklat",
        "lost_location": "Kantin",
        "lost_at": "2025-09-01T08:30:00Z"
    });
    let (status, body) = t.send("POST", "/reports", Some(&petugas), Some(report.clone())).await?;
    assert_denied(status, &body);
    let (status, body) = t.send("POST", "/reports", Some(&admin), Some(report.clone())).await?;
    assert_denied(status, &body);
    let (status, _) = t.send("POST", "/reports", Some(&user), Some(report)).await?;
    assert_eq!(status, StatusCode::CREATED);

    // only PETUGAS and ADMIN record found items
    let item = json!({
        "item_name": "Kunci motor",
        "found_location": "Parkiran",
        "found_at": "2025-09-01T10:00:00Z"
    });
    let (status, body) = t.send("POST", "/found-items", Some(&user), Some(item.clone())).await?;
    assert_denied(status, &body);
    let (status, created) = t.send("POST", "/found-items", Some(&petugas), Some(item)).await?;
    assert_eq!(status, StatusCode::CREATED);
    let item_id = common::id_of(&created);

    // marking claimed is PETUGAS only, even ADMIN is refused
    let claim = json!({"claimant_name": "Andi"});
    let uri = format!("/found-items/{}/claim", item_id);
    let (status, body) = t.send("PATCH", &uri, Some(&admin), Some(claim.clone())).await?;
    assert_denied(status, &body);
    let (status, body) = t.send("PATCH", &uri, Some(&user), Some(claim)).await?;
    assert_denied(status, &body);

    // deleting found items is ADMIN only
    let uri = format!("/found-items/{}", item_id);
    let (status, body) = t.send("DELETE", &uri, Some(&petugas), None).await?;
    assert_denied(status, &body);

    Ok(())
}

#[tokio::test]
async fn admin_only_controllers() -> Result<()> {
    let t = common::spawn_app().await?;
    let user = t.user_token("siti").await?;
    let petugas = t.staff("petugas", "PETUGAS").await?;
    let admin = t.staff("admin", "ADMIN").await?;

    for token in [&user, &petugas] {
        let (status, body) = t.send("GET", "/users", Some(token), None).await?;
        assert_denied(status, &body);
        let (status, body) = t.send("GET", "/activity", Some(token), None).await?;
        assert_denied(status, &body);
    }

    let (status, _) = t.send("GET", "/users", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send("GET", "/activity", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn permissions_follow_the_stored_table() -> Result<()> {
    let (pool, dir) = common::migrated_pool().await?;

    // USER lacks READ-CATEGORY in the stored table
    for (role, permission) in [("ADMIN", "MANAGE-CATEGORY"), ("ADMIN", "READ-CATEGORY"), ("USER", "CREATE-REPORT")] {
        sqlx::query("INSERT INTO role_permissions (role, permission) VALUES (?, ?)")
            .bind(role)
            .bind(permission)
            .execute(&pool)
            .await?;
    }

    let t = common::app_for(pool, dir).await?;
    let user = t.user_token("siti").await?;

    let (status, body) = t.send("GET", "/categories", Some(&user), None).await?;
    assert_denied(status, &body);

    let (status, profile) = t.send("GET", "/profile", Some(&user), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["permissions"], json!(["CREATE-REPORT"]));

    Ok(())
}
