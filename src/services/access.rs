//! Ownership checks shared by the project, patient and recording routes.
//!
//! Admins see every row. Clinicians see their own projects and everything
//! below them. Rows outside the caller's reach are reported as missing so
//! their existence does not leak.

use uuid::Uuid;

use crate::database::models::{Patient, Project, SessionDetail};
use crate::database::Store;
use crate::error::ApiError;
use crate::middleware::AuthUser;

fn can_see(user: &AuthUser, owner_id: Uuid) -> bool {
    user.is_admin() || user.id == owner_id
}

pub async fn project_for(
    store: &dyn Store,
    user: &AuthUser,
    id: Uuid,
    include_deleted: bool,
) -> Result<Project, ApiError> {
    match store.get_project(id, include_deleted).await? {
        Some(project) if can_see(user, project.owner_id) => Ok(project),
        _ => Err(ApiError::not_found("Project not found")),
    }
}

pub async fn patient_for(
    store: &dyn Store,
    user: &AuthUser,
    id: Uuid,
    include_deleted: bool,
) -> Result<(Patient, Project), ApiError> {
    let patient = store
        .get_patient(id, include_deleted)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    match store.get_project(patient.project_id, include_deleted).await? {
        Some(project) if can_see(user, project.owner_id) => Ok((patient, project)),
        _ => Err(ApiError::not_found("Patient not found")),
    }
}

pub async fn session_for(store: &dyn Store, user: &AuthUser, id: Uuid) -> Result<SessionDetail, ApiError> {
    let detail = store
        .get_session(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    match patient_for(store, user, detail.session.patient_id, false).await {
        Ok(_) => Ok(detail),
        Err(ApiError::NotFound(_)) => Err(ApiError::not_found("Session not found")),
        Err(other) => Err(other),
    }
}
