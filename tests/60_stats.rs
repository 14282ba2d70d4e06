mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{Part, TestApp};

#[tokio::test]
async fn stats_are_scoped_to_the_caller() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.clinician("alice@clinic.org").await?;
    let bob = app.clinician("bob@clinic.org").await?;
    let admin = app.admin_token().await?;

    let project = app.project(&alice, "Alice").await?;
    let patient = app.patient(&alice, &project, "A-1").await?;
    app.patient(&alice, &project, "A-2").await?;
    app.project(&bob, "Bob").await?;

    let uploaded = app
        .upload(
            &format!("/api/patients/{}/recordings", patient),
            &alice,
            &[
                Part::File { name: "video", filename: "r.webm", content_type: "video/webm", bytes: b"webm" },
                Part::File { name: "keypoints", filename: "k.json", content_type: "application/json", bytes: b"{}" },
            ],
        )
        .await?;
    let session = common::id_of(&uploaded)?;
    app.json(
        Method::PATCH,
        &format!("/api/sessions/{}/status", session),
        Some(&alice),
        Some(json!({ "status": "processing" })),
    )
    .await?;

    let mine = app.get("/api/stats", &alice).await?;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.data()["projects"], 1);
    assert_eq!(mine.data()["patients"], 2);
    assert_eq!(mine.data()["sessions"], 1);
    assert_eq!(mine.data()["sessions_by_status"]["processing"], 1);
    assert_eq!(mine.data()["sessions_by_status"]["uploaded"], 0);
    assert!(mine.data().get("pending_users").is_none());

    let bobs = app.get("/api/stats", &bob).await?;
    assert_eq!(bobs.data()["projects"], 1);
    assert_eq!(bobs.data()["patients"], 0);
    assert_eq!(bobs.data()["sessions"], 0);

    app.json(
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "waiting@clinic.org", "password": common::PASSWORD, "full_name": "Waiting" })),
    )
    .await?;

    let global = app.get("/api/stats", &admin).await?;
    assert_eq!(global.data()["projects"], 2);
    assert_eq!(global.data()["patients"], 2);
    assert_eq!(global.data()["pending_users"], 1);
    Ok(())
}

#[tokio::test]
async fn list_limits_are_clamped() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.clinician("bulk@clinic.org").await?;
    for n in 0..3 {
        app.project(&token, &format!("P{}", n)).await?;
    }

    let zero = app.get("/api/projects?limit=0", &token).await?;
    assert_eq!(zero.status, StatusCode::OK);
    assert_eq!(zero.data().as_array().map(Vec::len), Some(1));

    let huge = app.get("/api/projects?limit=100000", &token).await?;
    assert_eq!(huge.data().as_array().map(Vec::len), Some(3));

    let bad = app.get("/api/projects?limit=lots", &token).await?;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    Ok(())
}
