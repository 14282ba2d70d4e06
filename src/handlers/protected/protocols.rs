// handlers/protected/protocols.rs - /api/protocols

use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{PageQuery, Protocol};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::movement::ProtocolPlan;
use crate::services::protocols::{CreateProtocolRequest, DeleteMode, UpdateProtocolRequest, ValidationReport};
use crate::services::ProtocolService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IncludeDeletedQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub configuration: Value,
}

fn service(state: &AppState) -> ProtocolService {
    ProtocolService::new(state.store.clone())
}

/// GET /api/protocols?include_deleted=true
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<IncludeDeletedQuery>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<Protocol>> {
    let protocols = service(&state)
        .list(&user, query.include_deleted, state.page(page))
        .await?;
    Ok(ApiResponse::success(protocols))
}

/// POST /api/protocols
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateProtocolRequest>,
) -> ApiResult<Protocol> {
    Ok(ApiResponse::created(service(&state).create(&user, request).await?))
}

/// GET /api/protocols/:id?include_deleted=true
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<IncludeDeletedQuery>,
) -> ApiResult<Protocol> {
    Ok(ApiResponse::success(
        service(&state).get(&user, id, query.include_deleted).await?,
    ))
}

/// PUT /api/protocols/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateProtocolRequest>,
) -> ApiResult<Protocol> {
    Ok(ApiResponse::success(service(&state).update(&user, id, request).await?))
}

/// DELETE /api/protocols/:id?hard=true
///
/// Soft delete by default. `hard=true` removes the row and needs the admin
/// role plus zero recordings referencing the protocol.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
) -> ApiResult<Protocol> {
    let mode = if query.hard { DeleteMode::Hard } else { DeleteMode::Soft };
    Ok(ApiResponse::success(service(&state).delete(&user, id, mode).await?))
}

/// POST /api/protocols/:id/restore
pub async fn restore(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Protocol> {
    Ok(ApiResponse::success(service(&state).restore(&user, id).await?))
}

/// GET /api/protocols/:id/analysis-plan
pub async fn analysis_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ProtocolPlan> {
    Ok(ApiResponse::success(service(&state).analysis_plan(&user, id).await?))
}

/// POST /api/protocols/validate - dry run for the protocol editor
pub async fn validate(ApiJson(request): ApiJson<ValidateRequest>) -> ApiResult<ValidationReport> {
    Ok(ApiResponse::success(ProtocolService::validate(request.configuration)))
}
