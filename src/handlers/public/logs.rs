// handlers/public/logs.rs - POST /api/logs, error reports from the Android client

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct ClientLog {
    /// Milliseconds since the epoch on the device
    pub timestamp: i64,
    pub level: String,
    pub tag: String,
    pub message: String,
    #[serde(default, alias = "stackTrace")]
    pub stack_trace: Option<String>,
    #[serde(default, alias = "deviceInfo")]
    pub device_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientLevel {
    Error,
    Warn,
    Info,
}

impl ClientLevel {
    fn parse(level: &str) -> Self {
        match level.trim().to_ascii_uppercase().as_str() {
            "ERROR" | "E" | "FATAL" | "ASSERT" => ClientLevel::Error,
            "WARN" | "WARNING" | "W" => ClientLevel::Warn,
            _ => ClientLevel::Info,
        }
    }
}

/// Re-emit the report through tracing at the matching level.
pub async fn ingest(ApiJson(log): ApiJson<ClientLog>) -> Json<Value> {
    let stack_trace = log.stack_trace.as_deref().unwrap_or("");
    let device = log.device_info.as_deref().unwrap_or("unknown");

    match ClientLevel::parse(&log.level) {
        ClientLevel::Error => tracing::error!(
            target: "client",
            tag = %log.tag,
            device = %device,
            device_timestamp = log.timestamp,
            stack_trace = %stack_trace,
            "{}",
            log.message
        ),
        ClientLevel::Warn => tracing::warn!(
            target: "client",
            tag = %log.tag,
            device = %device,
            device_timestamp = log.timestamp,
            "{}",
            log.message
        ),
        ClientLevel::Info => tracing::info!(
            target: "client",
            tag = %log.tag,
            device = %device,
            device_timestamp = log.timestamp,
            "{}",
            log.message
        ),
    }

    Json(json!({ "status": "logged" }))
}
