#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use synaptihand_api::config::AppConfig;
use synaptihand_api::database::{MemoryStore, Store};
use synaptihand_api::services::bootstrap;
use synaptihand_api::storage::{FileStorage, LocalStorage};
use synaptihand_api::{app, AppState};

pub const ADMIN_EMAIL: &str = "admin@synaptihand.test";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "clinician-password";

pub const BOUNDARY: &str = "synaptihand-test-boundary";

/// The router wired to an in-memory store and a temporary storage root.
pub struct TestApp {
    router: Router,
    pub store: Arc<dyn Store>,
    pub storage_root: PathBuf,
    _dir: TempDir,
}

pub struct Response {
    pub status: StatusCode,
    pub body: Value,
}

impl Response {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let storage_root = dir.path().join("recordings");

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let storage: Arc<dyn FileStorage> = Arc::new(LocalStorage::new(&storage_root));

        let config = AppConfig::development();
        bootstrap::create_admin(&store, ADMIN_EMAIL, ADMIN_PASSWORD, "Admin", config.security.bcrypt_cost).await?;

        let router = app(AppState::new(store.clone(), storage, config));
        Ok(Self {
            router,
            store,
            storage_root,
            _dir: dir,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok(Response { status, body })
    }

    pub async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<Response> {
        self.json(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<Response> {
        self.json(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Result<Response> {
        self.json(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<Response> {
        self.json(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Response> {
        self.json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn admin_token(&self) -> Result<String> {
        token_of(self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?)
    }

    /// Register, approve and log in a clinician.
    pub async fn clinician(&self, email: &str) -> Result<String> {
        let registered = self
            .json(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "full_name": "Dr. Test" })),
            )
            .await?;
        anyhow::ensure!(registered.status == StatusCode::CREATED, "register failed: {}", registered.body);

        let id: Uuid = serde_json::from_value(registered.data()["user"]["id"].clone())?;
        self.store.set_user_approval(id, true).await?;

        token_of(self.login(email, PASSWORD).await?)
    }

    pub async fn project(&self, token: &str, name: &str) -> Result<String> {
        let res = self.post("/api/projects", token, json!({ "name": name })).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "project create failed: {}", res.body);
        id_of(&res)
    }

    pub async fn patient(&self, token: &str, project_id: &str, code: &str) -> Result<String> {
        let res = self
            .post(
                "/api/patients",
                token,
                json!({ "project_id": project_id, "patient_code": code, "name": "Jane Doe" }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "patient create failed: {}", res.body);
        id_of(&res)
    }

    pub async fn protocol(&self, token: &str, name: &str, is_public: bool) -> Result<String> {
        let res = self
            .post(
                "/api/protocols",
                token,
                json!({ "name": name, "configuration": tapping_configuration(), "is_public": is_public }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "protocol create failed: {}", res.body);
        id_of(&res)
    }

    /// POST a hand-built multipart body.
    pub async fn upload(&self, uri: &str, token: &str, parts: &[Part<'_>]) -> Result<Response> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body(parts)))?;
        self.send(request).await
    }
}

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn tapping_configuration() -> Value {
    json!({
        "movements": [
            { "type": "finger_tapping", "hand": "right", "fingers": ["index"], "mode": "unilateral", "repetitions": 10 }
        ],
        "analysis_outputs": { "handAperture": { "enabled": true } }
    })
}

pub fn token_of(res: Response) -> Result<String> {
    anyhow::ensure!(res.status == StatusCode::OK, "login failed: {}", res.body);
    res.data()["token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no token")
}

pub fn id_of(res: &Response) -> Result<String> {
    res.data()["id"]
        .as_str()
        .map(str::to_string)
        .with_context(|| format!("response has no id: {}", res.body))
}
