mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{Part, TestApp};

const VIDEO: &[u8] = b"\x1a\x45\xdf\xa3fake-webm-payload";
const KEYPOINTS: &[u8] = br#"{"frames":[{"t":0,"landmarks":[[0.1,0.2,0.0]]}]}"#;

fn files<'a>() -> Vec<Part<'a>> {
    vec![
        Part::File { name: "video", filename: "recording.webm", content_type: "video/webm", bytes: VIDEO },
        Part::File { name: "keypoints", filename: "keypoints.json", content_type: "application/json", bytes: KEYPOINTS },
    ]
}

fn recording_parts(video: &'static [u8], keypoints: &'static [u8]) -> Vec<Part<'static>> {
    vec![
        Part::File { name: "video", filename: "recording.webm", content_type: "video/webm", bytes: video },
        Part::File { name: "keypoints", filename: "keypoints.json", content_type: "application/json", bytes: keypoints },
    ]
}

async fn setup(app: &TestApp) -> Result<(String, String, String)> {
    let token = app.clinician("recorder@clinic.org").await?;
    let project = app.project(&token, "Recordings").await?;
    let patient = app.patient(&token, &project, "P-042").await?;
    Ok((token, project, patient))
}

#[tokio::test]
async fn upload_stores_both_files_and_checksums() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, project, patient) = setup(&app).await?;
    let protocol = app.protocol(&token, "Tapping", false).await?;

    let mut parts = files();
    parts.push(Part::Text { name: "protocol_id", value: &protocol });
    parts.push(Part::Text { name: "notes", value: "left hand tremor visible" });

    let res = app
        .upload(&format!("/api/patients/{}/recordings", patient), &token, &parts)
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "upload failed: {}", res.body);

    let data = res.data();
    assert_eq!(data["status"], "uploaded");
    assert_eq!(data["notes"], "left hand tremor visible");
    assert_eq!(data["patient"]["patient_code"], "P-042");
    assert_eq!(data["protocol"]["name"], "Tapping");
    assert_eq!(data["video_sha256"], synaptihand_api::storage::sha256_hex(VIDEO));
    assert_eq!(data["keypoints_sha256"], synaptihand_api::storage::sha256_hex(KEYPOINTS));

    let video_path = data["video_path"].as_str().unwrap_or_default().to_string();
    let prefix = format!("projects/{}/P-042/", project);
    assert!(video_path.contains(&prefix), "unexpected path {}", video_path);
    assert!(video_path.ends_with("/recording.webm"));
    assert_eq!(std::fs::read(&video_path)?, VIDEO);

    let keypoints_path = data["keypoints_path"].as_str().unwrap_or_default().to_string();
    assert!(keypoints_path.ends_with("/keypoints.json"));
    assert_eq!(std::fs::read(&keypoints_path)?, KEYPOINTS);
    assert!(std::path::Path::new(&video_path).starts_with(&app.storage_root));

    let listed = app.get(&format!("/api/patients/{}/recordings", patient), &token).await?;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.data().as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn back_to_back_uploads_never_overwrite_each_other() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, _, patient) = setup(&app).await?;
    let uri = format!("/api/patients/{}/recordings", patient);

    let first = app.upload(&uri, &token, &recording_parts(b"first-video", b"{\"take\":1}")).await?;
    let second = app
        .upload(&uri, &token, &recording_parts(b"second-video-different", b"{\"take\":2}"))
        .await?;
    assert_eq!(first.status, StatusCode::CREATED, "first upload failed: {}", first.body);
    assert_eq!(second.status, StatusCode::CREATED, "second upload failed: {}", second.body);

    let first_video = first.data()["video_path"].as_str().unwrap_or_default().to_string();
    let second_video = second.data()["video_path"].as_str().unwrap_or_default().to_string();
    assert_ne!(first_video, second_video);
    assert_ne!(first.data()["keypoints_path"], second.data()["keypoints_path"]);

    for (res, video, keypoints) in [
        (&first, &b"first-video"[..], &b"{\"take\":1}"[..]),
        (&second, &b"second-video-different"[..], &b"{\"take\":2}"[..]),
    ] {
        let video_path = res.data()["video_path"].as_str().unwrap_or_default();
        let keypoints_path = res.data()["keypoints_path"].as_str().unwrap_or_default();
        let on_disk = std::fs::read(video_path)?;
        assert_eq!(on_disk, video);
        assert_eq!(res.data()["video_sha256"], synaptihand_api::storage::sha256_hex(&on_disk));
        assert_eq!(std::fs::read(keypoints_path)?, keypoints);
    }
    Ok(())
}

#[tokio::test]
async fn upload_requires_both_files_and_json_keypoints() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, _, patient) = setup(&app).await?;
    let uri = format!("/api/patients/{}/recordings", patient);

    let no_video = app
        .upload(
            &uri,
            &token,
            &[Part::File { name: "keypoints", filename: "k.json", content_type: "application/json", bytes: KEYPOINTS }],
        )
        .await?;
    assert_eq!(no_video.status, StatusCode::BAD_REQUEST);
    assert!(no_video.body["field_errors"].get("video").is_some());

    let no_keypoints = app
        .upload(
            &uri,
            &token,
            &[Part::File { name: "video", filename: "r.webm", content_type: "video/webm", bytes: VIDEO }],
        )
        .await?;
    assert_eq!(no_keypoints.status, StatusCode::BAD_REQUEST);
    assert!(no_keypoints.body["field_errors"].get("keypoints").is_some());

    let not_json = app
        .upload(
            &uri,
            &token,
            &[
                Part::File { name: "video", filename: "r.webm", content_type: "video/webm", bytes: VIDEO },
                Part::File { name: "keypoints", filename: "k.json", content_type: "application/json", bytes: b"{oops" },
            ],
        )
        .await?;
    assert_eq!(not_json.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_json.body["field_errors"]["keypoints"], "keypoints must be valid JSON");

    let listed = app.get(&uri, &token).await?;
    assert_eq!(listed.data().as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn deleted_protocols_cannot_be_attached() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, _, patient) = setup(&app).await?;
    let protocol = app.protocol(&token, "Retired", false).await?;
    app.delete(&format!("/api/protocols/{}", protocol), &token).await?;

    let mut parts = files();
    parts.push(Part::Text { name: "protocol_id", value: &protocol });
    let res = app
        .upload(&format!("/api/patients/{}/recordings", patient), &token, &parts)
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["field_errors"].get("protocol_id").is_some());

    let mut parts = files();
    parts.push(Part::Text { name: "protocol_id", value: "not-a-uuid" });
    let res = app
        .upload(&format!("/api/patients/{}/recordings", patient), &token, &parts)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn session_keeps_soft_deleted_protocol_summary() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, _, patient) = setup(&app).await?;
    let protocol = app.protocol(&token, "Archived later", false).await?;

    let mut parts = files();
    parts.push(Part::Text { name: "protocol_id", value: &protocol });
    let uploaded = app
        .upload(&format!("/api/patients/{}/recordings", patient), &token, &parts)
        .await?;
    let session = common::id_of(&uploaded)?;

    app.delete(&format!("/api/protocols/{}", protocol), &token).await?;

    let shown = app.get(&format!("/api/sessions/{}", session), &token).await?;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.data()["protocol"]["name"], "Archived later");
    assert_eq!(shown.data()["protocol"]["deleted"], true);
    Ok(())
}

#[tokio::test]
async fn session_status_follows_the_state_machine() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, _, patient) = setup(&app).await?;
    let other = app.clinician("other@clinic.org").await?;

    let uploaded = app
        .upload(&format!("/api/patients/{}/recordings", patient), &token, &files())
        .await?;
    let session = common::id_of(&uploaded)?;
    let status_uri = format!("/api/sessions/{}/status", session);

    let skip = app
        .json(Method::PATCH, &status_uri, Some(&token), Some(json!({ "status": "completed" })))
        .await?;
    assert_eq!(skip.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(skip.body["field_errors"].get("status").is_some());

    for next in ["processing", "failed", "processing", "completed"] {
        let res = app
            .json(Method::PATCH, &status_uri, Some(&token), Some(json!({ "status": next })))
            .await?;
        assert_eq!(res.status, StatusCode::OK, "moving to {} failed: {}", next, res.body);
        assert_eq!(res.data()["status"], next);
    }

    let unknown = app
        .json(Method::PATCH, &status_uri, Some(&token), Some(json!({ "status": "archived" })))
        .await?;
    assert!(unknown.status.is_client_error());

    let foreign = app.get(&format!("/api/sessions/{}", session), &other).await?;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    Ok(())
}
