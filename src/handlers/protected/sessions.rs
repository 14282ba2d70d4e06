// handlers/protected/sessions.rs - /api/sessions/:id

use axum::{extract::State, Extension};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{SessionDetail, SessionStatus};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::RecordingService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: SessionStatus,
}

/// GET /api/sessions/:id - recording with embedded patient and protocol
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<SessionDetail> {
    let service = RecordingService::new(state.store.clone(), state.storage.clone());
    Ok(ApiResponse::success(service.get(&user, id).await?))
}

/// PATCH /api/sessions/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<SessionDetail> {
    let service = RecordingService::new(state.store.clone(), state.storage.clone());
    Ok(ApiResponse::success(service.update_status(&user, id, request.status).await?))
}
