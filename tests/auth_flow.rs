mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn register_login_and_me() -> Result<()> {
    let t = common::spawn_app().await?;

    let registered = t.register("siti").await?;
    assert_eq!(registered["user"]["role"], "USER");
    assert!(registered["user"].get("password_hash").is_none());
    assert!(registered["refresh_token"].is_string());

    let token = t.login("siti").await?;
    let (status, me) = t.send("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "siti");
    assert_eq!(me["email"], "siti@kampus.ac.id");

    Ok(())
}

#[tokio::test]
async fn registration_edge_cases() -> Result<()> {
    let t = common::spawn_app().await?;
    t.register("budi").await?;

    // duplicate username
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({"full_name": "Budi Lain", "username": "budi", "password": "password123"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // duplicate email
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({"full_name": "Budi Dua", "username": "budi2", "email": "budi@kampus.ac.id", "password": "password123"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // short password and bad username
    let (status, body) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({"full_name": "X", "username": "x y", "password": "short"})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("password"), "{}", message);
    assert!(message.contains("username"), "{}", message);

    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_credentials() -> Result<()> {
    let t = common::spawn_app().await?;
    t.register("rina").await?;

    let (status, _) = t
        .send("POST", "/auth/login", None, Some(json!({"username": "rina", "password": "wrongpassword"})))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .send("POST", "/auth/login", None, Some(json!({"username": "nobody", "password": "password123"})))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() -> Result<()> {
    let t = common::spawn_app().await?;

    let (status, _) = t.send("GET", "/auth/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "missing token");

    let (status, _) = t.send("GET", "/auth/me", Some("garbage"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "invalid token");

    let (status, _) = t.send("GET", "/profile", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_retires_tokens() -> Result<()> {
    let t = common::spawn_app().await?;
    let registered = t.register("andi").await?;
    let access = registered["access_token"].as_str().unwrap_or_default().to_string();
    let refresh = registered["refresh_token"].as_str().unwrap_or_default().to_string();

    // token kinds are not interchangeable
    let (status, _) = t.send("GET", "/auth/me", Some(&refresh), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.send("POST", "/auth/refresh", Some(&access), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, rotated) = t.send("POST", "/auth/refresh", Some(&refresh), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", rotated);
    let next_refresh = rotated["refresh_token"].as_str().unwrap_or_default().to_string();
    assert_ne!(next_refresh, refresh);

    // the old refresh token is retired
    let (status, _) = t.send("POST", "/auth/refresh", Some(&refresh), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // logout revokes the current one
    let new_access = rotated["access_token"].as_str().unwrap_or_default().to_string();
    let (status, _) = t.send("POST", "/auth/logout", Some(&new_access), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send("POST", "/auth/refresh", Some(&next_refresh), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn profile_update_and_password_change() -> Result<()> {
    let t = common::spawn_app().await?;
    let token = t.user_token("dewi").await?;

    let (status, profile) = t.send("GET", "/profile", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let perms: Vec<&str> = profile["permissions"]
        .as_array()
        .map(|a| a.iter().filter_map(|p| p.as_str()).collect())
        .unwrap_or_default();
    assert!(perms.contains(&"CREATE-REPORT"));
    assert!(!perms.contains(&"MARK-CLAIMED"));

    let (status, user) = t
        .send("PUT", "/profile", Some(&token), Some(json!({"full_name": "Dewi Lestari"})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["full_name"], "Dewi Lestari");

    let (status, _) = t
        .send(
            "PUT",
            "/profile/password",
            Some(&token),
            Some(json!({"current_password": "wrong-one", "new_password": "barubaru123"})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            "PUT",
            "/profile/password",
            Some(&token),
            Some(json!({"current_password": common::PASSWORD, "new_password": "barubaru123"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send("POST", "/auth/login", None, Some(json!({"username": "dewi", "password": "barubaru123"})))
        .await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn password_change_revokes_refresh_sessions() -> Result<()> {
    let t = common::spawn_app().await?;
    let registered = t.register("wati").await?;
    let access = registered["access_token"].as_str().unwrap_or_default().to_string();
    let refresh = registered["refresh_token"].as_str().unwrap_or_default().to_string();

    let (status, _) = t
        .send(
            "PUT",
            "/profile/password",
            Some(&access),
            Some(json!({"current_password": common::PASSWORD, "new_password": "barubaru123"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("POST", "/auth/refresh", Some(&refresh), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // signing in again opens a fresh session
    let (status, body) = t
        .send("POST", "/auth/login", None, Some(json!({"username": "wati", "password": "barubaru123"})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let next_refresh = body["refresh_token"].as_str().unwrap_or_default().to_string();
    let (status, _) = t.send("POST", "/auth/refresh", Some(&next_refresh), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
