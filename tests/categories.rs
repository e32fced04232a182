mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn category_crud_and_conflicts() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.staff("admin", "ADMIN").await?;
    let user = t.user_token("siti").await?;

    for name in ["Kunci", "Dokumen", "Elektronik"] {
        let (status, _) = t
            .send("POST", "/categories", Some(&admin), Some(json!({ "name": name })))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    // names are unique, case-insensitively
    let (status, _) = t
        .send("POST", "/categories", Some(&admin), Some(json!({ "name": "kunci" })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = t.send("GET", "/categories", Some(&user), None).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = list
        .as_array()
        .map(|a| a.iter().filter_map(|c| c["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["Dokumen", "Elektronik", "Kunci"]);

    let kunci = list
        .as_array()
        .and_then(|a| a.iter().find(|c| c["name"] == "Kunci"))
        .map(common::id_of)
        .unwrap_or_default();

    let (status, updated) = t
        .send(
            "PUT",
            &format!("/categories/{}", kunci),
            Some(&admin),
            Some(json!({ "description": "Kunci motor dan kos" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Kunci");
    assert_eq!(updated["description"], "Kunci motor dan kos");

    // in use by a live report
    let (status, _) = t
        .send(
            "POST",
            "/reports",
            Some(&user),
            Some(json!({
                "category_id": kunci,
                "item_name": "Kunci kos",
                "lost_location": "Masjid kampus",
                "lost_at": "2025-09-02T12:00:00Z"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t.send("DELETE", &format!("/categories/{}", kunci), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let dokumen = list
        .as_array()
        .and_then(|a| a.iter().find(|c| c["name"] == "Dokumen"))
        .map(common::id_of)
        .unwrap_or_default();
    let (status, _) = t.send("DELETE", &format!("/categories/{}", dokumen), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.send("GET", &format!("/categories/{}", dokumen), Some(&user), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn unknown_category_reference_is_rejected() -> Result<()> {
    let t = common::spawn_app().await?;
    let user = t.user_token("siti").await?;

    let (status, _) = t
        .send(
            "POST",
            "/reports",
            Some(&user),
            Some(json!({
                "category_id": uuid::Uuid::new_v4(),
                "item_name": "Payung",
                "lost_location": "Halte",
                "lost_at": "2025-09-02T12:00:00Z"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}
