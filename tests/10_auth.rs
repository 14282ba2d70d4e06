mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, ADMIN_EMAIL, PASSWORD};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.json(Method::GET, "/health", None, None).await?;

    assert_eq!(res.status, StatusCode::OK, "unexpected body: {}", res.body);
    assert_eq!(res.data()["status"], "ok");
    assert_eq!(res.data()["database_backend"], "memory");
    assert_eq!(res.data()["storage_backend"], "local");
    Ok(())
}

#[tokio::test]
async fn registration_waits_for_approval() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "New@Clinic.org", "password": PASSWORD, "full_name": "Dr. New" })),
        )
        .await?;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["message"], "Waiting approval from an administrator");
    assert_eq!(res.data()["user"]["email"], "new@clinic.org");
    assert_eq!(res.data()["user"]["is_approved"], false);
    assert!(res.data()["user"].get("password_hash").is_none());

    let login = app.login("new@clinic.org", PASSWORD).await?;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
    assert_eq!(login.body["success"], false);
    Ok(())
}

#[tokio::test]
async fn duplicate_and_invalid_registrations_are_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.clinician("dup@clinic.org").await?;

    let dup = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "DUP@clinic.org", "password": PASSWORD, "full_name": "Again" })),
        )
        .await?;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let invalid = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "short", "full_name": "" })),
        )
        .await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["code"], "VALIDATION_ERROR");
    assert!(invalid.body["field_errors"].get("email").is_some());
    assert!(invalid.body["field_errors"].get("password").is_some());
    Ok(())
}

#[tokio::test]
async fn login_returns_token_and_expiry() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.login(ADMIN_EMAIL, common::ADMIN_PASSWORD).await?;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.data()["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(res.data()["expires_in"], 7 * 24 * 3600);
    assert_eq!(res.data()["user"]["role"], "admin");

    let wrong = app.login(ADMIN_EMAIL, "wrong-password").await?;
    let unknown = app.login("nobody@clinic.org", "whatever-password").await?;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], unknown.body["message"]);
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() -> Result<()> {
    let app = TestApp::spawn().await?;

    let missing = app.json(Method::GET, "/api/auth/whoami", None, None).await?;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"], true);

    let garbage = app.get("/api/auth/whoami", "not.a.jwt").await?;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);

    let token = app.clinician("me@clinic.org").await?;
    let me = app.get("/api/auth/whoami", &token).await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.data()["email"], "me@clinic.org");
    assert_eq!(me.data()["role"], "clinician");
    Ok(())
}

#[tokio::test]
async fn admin_routes_are_admin_only() -> Result<()> {
    let app = TestApp::spawn().await?;
    let clinician = app.clinician("c@clinic.org").await?;
    let admin = app.admin_token().await?;

    let denied = app.get("/api/admin/users", &clinician).await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let registered = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "pending@clinic.org", "password": PASSWORD, "full_name": "Pending" })),
        )
        .await?;
    let pending_id = registered.data()["user"]["id"].as_str().unwrap_or_default().to_string();

    let pending = app.get("/api/admin/users?pending=true", &admin).await?;
    assert_eq!(pending.status, StatusCode::OK);
    let emails: Vec<&str> = pending
        .data()
        .as_array()
        .map(|users| users.iter().filter_map(|u| u["email"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(emails, vec!["pending@clinic.org"]);

    let approved = app
        .json(Method::POST, &format!("/api/admin/users/{}/approve", pending_id), Some(&admin), None)
        .await?;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.data()["is_approved"], true);
    assert_eq!(app.login("pending@clinic.org", PASSWORD).await?.status, StatusCode::OK);

    let promoted = app
        .put(&format!("/api/admin/users/{}/role", pending_id), &admin, json!({ "role": "admin" }))
        .await?;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.data()["role"], "admin");
    Ok(())
}

#[tokio::test]
async fn admin_cannot_demote_themselves() -> Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.admin_token().await?;
    let me = app.get("/api/auth/whoami", &admin).await?;
    let id = me.data()["id"].as_str().unwrap_or_default().to_string();

    let res = app
        .put(&format!("/api/admin/users/{}/role", id), &admin, json!({ "role": "clinician" }))
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn client_logs_are_accepted_without_auth() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app
        .json(
            Method::POST,
            "/api/logs",
            None,
            Some(json!({
                "timestamp": 1_717_000_000_000i64,
                "level": "ERROR",
                "tag": "CameraActivity",
                "message": "camera failed to open",
                "stackTrace": "java.lang.IllegalStateException",
                "deviceInfo": "Pixel 7"
            })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "logged");

    let malformed = app
        .json(Method::POST, "/api/logs", None, Some(json!({ "level": "ERROR" })))
        .await?;
    assert!(malformed.status.is_client_error());
    Ok(())
}
