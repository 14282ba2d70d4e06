// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

/// GET / - service description
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "name": "SynaptiHand API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "endpoints": {
                "auth": "/api/auth/register, /api/auth/login (public), /api/auth/whoami (protected)",
                "logs": "/api/logs (public, client error reports)",
                "projects": "/api/projects[/:id] (protected)",
                "patients": "/api/patients[/:id][/recordings] (protected)",
                "sessions": "/api/sessions/:id[/status] (protected)",
                "protocols": "/api/protocols[/:id][/analysis-plan] (protected)",
                "stats": "/api/stats (protected)",
                "admin": "/api/admin/users (admin)"
            }
        }
    }))
}

/// GET /health - store and file storage reachability
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let uptime = (now - state.started_at).num_seconds();
    let database = state.store.ping().await;
    let storage = state.storage.health().await;

    let status = |ok: bool| if ok { "ok" } else { "error" };
    let healthy = database.is_ok() && storage.is_ok();

    if let Err(e) = &database {
        tracing::warn!("Health check: database error: {}", e);
    }
    if let Err(e) = &storage {
        tracing::warn!("Health check: storage error: {}", e);
    }

    let body = json!({
        "success": healthy,
        "data": {
            "status": if healthy { "ok" } else { "degraded" },
            "timestamp": now,
            "uptime_seconds": uptime,
            "database": status(database.is_ok()),
            "database_backend": state.store.backend(),
            "storage": status(storage.is_ok()),
            "storage_backend": state.storage.backend()
        }
    });

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}
