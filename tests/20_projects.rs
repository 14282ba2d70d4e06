mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn project_crud_and_soft_delete() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.clinician("owner@clinic.org").await?;

    let id = app.project(&token, "Tremor study").await?;
    let shown = app.get(&format!("/api/projects/{}", id), &token).await?;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.data()["name"], "Tremor study");

    let updated = app
        .put(&format!("/api/projects/{}", id), &token, json!({ "description": "Phase II" }))
        .await?;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.data()["name"], "Tremor study");
    assert_eq!(updated.data()["description"], "Phase II");

    let deleted = app.delete(&format!("/api/projects/{}", id), &token).await?;
    assert_eq!(deleted.status, StatusCode::OK);
    assert!(!deleted.data()["deleted_at"].is_null());

    let gone = app.get(&format!("/api/projects/{}", id), &token).await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    let listed = app.get("/api/projects", &token).await?;
    assert_eq!(listed.data().as_array().map(Vec::len), Some(0));

    let restored = app
        .json(Method::POST, &format!("/api/projects/{}/restore", id), Some(&token), None)
        .await?;
    assert_eq!(restored.status, StatusCode::OK);
    assert!(restored.data()["deleted_at"].is_null());

    let again = app
        .json(Method::POST, &format!("/api/projects/{}/restore", id), Some(&token), None)
        .await?;
    assert_eq!(again.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn clinicians_only_see_their_own_projects() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.clinician("alice@clinic.org").await?;
    let bob = app.clinician("bob@clinic.org").await?;
    let admin = app.admin_token().await?;

    let alices = app.project(&alice, "Alice's cohort").await?;
    app.project(&bob, "Bob's cohort").await?;

    let hidden = app.get(&format!("/api/projects/{}", alices), &bob).await?;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
    let tamper = app
        .put(&format!("/api/projects/{}", alices), &bob, json!({ "name": "mine now" }))
        .await?;
    assert_eq!(tamper.status, StatusCode::NOT_FOUND);

    let bobs_list = app.get("/api/projects", &bob).await?;
    assert_eq!(bobs_list.data().as_array().map(Vec::len), Some(1));
    assert_eq!(bobs_list.data()[0]["name"], "Bob's cohort");

    let admins_list = app.get("/api/projects", &admin).await?;
    assert_eq!(admins_list.data().as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn project_validation_and_paging() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.clinician("pager@clinic.org").await?;

    let blank = app.post("/api/projects", &token, json!({ "name": "   " })).await?;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank.body["field_errors"]["name"], "is required");

    for n in 0..3 {
        app.project(&token, &format!("Project {}", n)).await?;
    }
    let page = app.get("/api/projects?limit=2&offset=0", &token).await?;
    assert_eq!(page.data().as_array().map(Vec::len), Some(2));
    let rest = app.get("/api/projects?limit=2&offset=2", &token).await?;
    assert_eq!(rest.data().as_array().map(Vec::len), Some(1));

    let bad_id = app.get("/api/projects/not-a-uuid", &token).await?;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    Ok(())
}
