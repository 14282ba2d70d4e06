// handlers/protected/projects.rs - /api/projects

use axum::{extract::State, Extension};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{NewProject, PageQuery, Project, ProjectUpdate};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::access;
use crate::state::AppState;

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

fn check_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::field("name", "is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::field("name", format!("must be at most {} characters", MAX_NAME_LEN)));
    }
    Ok(name.to_string())
}

/// GET /api/projects
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<Project>> {
    let projects = state.store.list_projects(user.scope(), state.page(page)).await?;
    Ok(ApiResponse::success(projects))
}

/// POST /api/projects - the caller becomes the owner
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateProjectRequest>,
) -> ApiResult<Project> {
    let project = state
        .store
        .create_project(NewProject {
            name: check_name(&request.name)?,
            description: request.description,
            owner_id: user.id,
        })
        .await?;
    tracing::info!("Project {} created by {}", project.id, user.email);
    Ok(ApiResponse::created(project))
}

/// GET /api/projects/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Project> {
    let project = access::project_for(state.store.as_ref(), &user, id, false).await?;
    Ok(ApiResponse::success(project))
}

/// PUT /api/projects/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut update): ApiJson<ProjectUpdate>,
) -> ApiResult<Project> {
    access::project_for(state.store.as_ref(), &user, id, false).await?;
    if let Some(name) = &update.name {
        update.name = Some(check_name(name)?);
    }
    Ok(ApiResponse::success(state.store.update_project(id, update).await?))
}

/// DELETE /api/projects/:id - soft delete; its patients disappear with it
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Project> {
    access::project_for(state.store.as_ref(), &user, id, false).await?;
    let project = state.store.set_project_deleted(id, true).await?;
    tracing::info!("Project {} deleted by {}", id, user.email);
    Ok(ApiResponse::success(project))
}

/// POST /api/projects/:id/restore
pub async fn restore(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Project> {
    let project = access::project_for(state.store.as_ref(), &user, id, true).await?;
    if project.deleted_at.is_none() {
        return Err(ApiError::conflict("Project is not deleted"));
    }
    Ok(ApiResponse::success(state.store.set_project_deleted(id, false).await?))
}
