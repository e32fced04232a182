mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

fn found_keys() -> Value {
    json!({
        "item_name": "Kunci motor",
        "description": "Gantungan biru",
        "found_location": "Parkiran gedung B",
        "found_at": "2025-09-01T10:00:00Z",
        "storage_location": "Pos satpam, loker 3"
    })
}

#[tokio::test]
async fn claim_resolves_the_linked_report() -> Result<()> {
    let t = common::spawn_app().await?;
    let registered = t.register("siti").await?;
    let siti = registered["access_token"].as_str().unwrap_or_default().to_string();
    let siti_id = common::id_of(&registered["user"]);
    let petugas = t.staff("petugas", "PETUGAS").await?;

    let (_, report) = t
        .send(
            "POST",
            "/reports",
            Some(&siti),
            Some(json!({"item_name": "Kunci motor", "lost_location": "Parkiran", "lost_at": "2025-09-01T07:00:00Z"})),
        )
        .await?;
    let report_id = common::id_of(&report);

    let (status, item) = t.send("POST", "/found-items", Some(&petugas), Some(found_keys())).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["status"], "UNCLAIMED");
    let claim_uri = format!("/found-items/{}/claim", common::id_of(&item));

    let (status, claimed) = t
        .send(
            "PATCH",
            &claim_uri,
            Some(&petugas),
            Some(json!({"claimant_name": "Siti", "claimant_user_id": siti_id, "report_id": report_id})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", claimed);
    assert_eq!(claimed["status"], "CLAIMED");
    assert_eq!(claimed["claimant_name"], "Siti");
    assert_eq!(claimed["report_id"], report_id.as_str());
    assert!(claimed["claimed_at"].is_string());

    let (_, report) = t.send("GET", &format!("/reports/{}", report_id), Some(&siti), None).await?;
    assert_eq!(report["status"], "RESOLVED");

    // claims happen once
    let (status, _) = t
        .send("PATCH", &claim_uri, Some(&petugas), Some(json!({"claimant_name": "Orang lain"})))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // claimed items are frozen
    let (status, _) = t
        .send(
            "PUT",
            &format!("/found-items/{}", common::id_of(&item)),
            Some(&petugas),
            Some(json!({"storage_location": "Gudang"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn claim_rejects_closed_or_unknown_references() -> Result<()> {
    let t = common::spawn_app().await?;
    let siti = t.user_token("siti").await?;
    let petugas = t.staff("petugas", "PETUGAS").await?;
    let admin = t.staff("admin", "ADMIN").await?;

    let (_, report) = t
        .send(
            "POST",
            "/reports",
            Some(&siti),
            Some(json!({"item_name": "Payung", "lost_location": "Halte", "lost_at": "2025-09-01T07:00:00Z"})),
        )
        .await?;
    let report_id = common::id_of(&report);
    let (status, _) = t
        .send(
            "PATCH",
            &format!("/reports/{}/status", report_id),
            Some(&admin),
            Some(json!({"status": "REJECTED"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, item) = t.send("POST", "/found-items", Some(&petugas), Some(found_keys())).await?;
    let claim_uri = format!("/found-items/{}/claim", common::id_of(&item));

    let (status, _) = t
        .send(
            "PATCH",
            &claim_uri,
            Some(&petugas),
            Some(json!({"claimant_name": "Siti", "report_id": report_id})),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .send(
            "PATCH",
            &claim_uri,
            Some(&petugas),
            Some(json!({"claimant_name": "Siti", "report_id": uuid::Uuid::new_v4()})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            "PATCH",
            &claim_uri,
            Some(&petugas),
            Some(json!({"claimant_name": "Siti", "claimant_user_id": uuid::Uuid::new_v4()})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // failed claims leave the item untouched
    let (_, fetched) = t
        .send("GET", &format!("/found-items/{}", common::id_of(&item)), Some(&siti), None)
        .await?;
    assert_eq!(fetched["status"], "UNCLAIMED");

    let (status, _) = t
        .send("PATCH", "/found-items/00000000-0000-0000-0000-000000000000/claim", Some(&petugas), Some(json!({"claimant_name": "X"})))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn list_filters_and_admin_delete() -> Result<()> {
    let t = common::spawn_app().await?;
    let siti = t.user_token("siti").await?;
    let petugas = t.staff("petugas", "PETUGAS").await?;
    let admin = t.staff("admin", "ADMIN").await?;

    let (_, keys) = t.send("POST", "/found-items", Some(&petugas), Some(found_keys())).await?;
    let (status, _) = t
        .send(
            "POST",
            "/found-items",
            Some(&admin),
            Some(json!({"item_name": "Botol minum", "found_location": "Aula", "found_at": "2025-09-02T10:00:00Z"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    // every role reads the catalogue
    let (status, all) = t.send("GET", "/found-items", Some(&siti), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let (_, hits) = t.send("GET", "/found-items?q=kunci", Some(&siti), None).await?;
    let hits = hits.as_array().cloned().unwrap_or_default();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["item_name"], "Kunci motor");

    let (_, claimed) = t.send("GET", "/found-items?status=CLAIMED", Some(&siti), None).await?;
    assert_eq!(claimed.as_array().map(Vec::len), Some(0));

    let uri = format!("/found-items/{}", common::id_of(&keys));
    let (status, _) = t.send("DELETE", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.send("GET", &uri, Some(&siti), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, all) = t.send("GET", "/found-items", Some(&siti), None).await?;
    assert_eq!(all.as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn search_treats_wildcards_literally() -> Result<()> {
    let t = common::spawn_app().await?;
    let siti = t.user_token("siti").await?;
    let petugas = t.staff("petugas", "PETUGAS").await?;

    for name in ["Kunci motor", "Flashdisk 100%", "Charger_laptop"] {
        let (status, _) = t
            .send(
                "POST",
                "/found-items",
                Some(&petugas),
                Some(json!({"item_name": name, "found_location": "Lab", "found_at": "2025-09-02T10:00:00Z"})),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, hits) = t.send("GET", "/found-items?q=_", Some(&siti), None).await?;
    assert_eq!(status, StatusCode::OK);
    let hits = hits.as_array().cloned().unwrap_or_default();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["item_name"], "Charger_laptop");

    let (_, hits) = t.send("GET", "/found-items?q=%25", Some(&siti), None).await?;
    let hits = hits.as_array().cloned().unwrap_or_default();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["item_name"], "Flashdisk 100%");

    Ok(())
}
