// handlers/protected/patients.rs - /api/patients

use axum::{extract::State, Extension};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{NewPatient, PageQuery, Patient, PatientUpdate};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::movement::FieldErrors;
use crate::services::access;
use crate::state::AppState;

const MAX_CODE_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ListPatientsQuery {
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub project_id: Uuid,
    pub patient_code: String,
    pub name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

/// Patient codes end up as a storage path segment.
fn check_code(code: &str, errors: &mut FieldErrors) {
    let valid_chars = code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if code.is_empty() {
        errors.insert("patient_code".to_string(), "is required".to_string());
    } else if code.len() > MAX_CODE_LEN || !valid_chars || code.starts_with('.') {
        errors.insert(
            "patient_code".to_string(),
            format!(
                "must be at most {} characters of letters, digits, '-', '_' or '.' and not start with '.'",
                MAX_CODE_LEN
            ),
        );
    }
}

fn check_measurements(
    date_of_birth: Option<NaiveDate>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    errors: &mut FieldErrors,
) {
    if let Some(dob) = date_of_birth {
        if dob > chrono::Utc::now().date_naive() {
            errors.insert("date_of_birth".to_string(), "cannot be in the future".to_string());
        }
    }
    if matches!(height_cm, Some(h) if !(h > 0.0 && h < 300.0)) {
        errors.insert("height_cm".to_string(), "must be between 0 and 300".to_string());
    }
    if matches!(weight_kg, Some(w) if !(w > 0.0 && w < 700.0)) {
        errors.insert("weight_kg".to_string(), "must be between 0 and 700".to_string());
    }
}

/// GET /api/patients?project_id=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListPatientsQuery>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<Patient>> {
    if let Some(project_id) = query.project_id {
        access::project_for(state.store.as_ref(), &user, project_id, false).await?;
    }
    let patients = state
        .store
        .list_patients(user.scope(), query.project_id, state.page(page))
        .await?;
    Ok(ApiResponse::success(patients))
}

/// POST /api/patients
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreatePatientRequest>,
) -> ApiResult<Patient> {
    let code = request.patient_code.trim().to_string();
    let mut errors = FieldErrors::new();
    check_code(&code, &mut errors);
    if request.name.trim().is_empty() {
        errors.insert("name".to_string(), "is required".to_string());
    }
    check_measurements(request.date_of_birth, request.height_cm, request.weight_kg, &mut errors);
    if !errors.is_empty() {
        return Err(ApiError::validation_error("Invalid patient", Some(errors)));
    }

    // A project the caller cannot see reads as a bad reference, not a missing route.
    let project = match access::project_for(state.store.as_ref(), &user, request.project_id, false).await {
        Ok(project) => project,
        Err(ApiError::NotFound(_)) => return Err(ApiError::field("project_id", "unknown project")),
        Err(other) => return Err(other),
    };

    let patient = state
        .store
        .create_patient(NewPatient {
            project_id: project.id,
            patient_code: code,
            name: request.name.trim().to_string(),
            gender: request.gender,
            date_of_birth: request.date_of_birth,
            height_cm: request.height_cm,
            weight_kg: request.weight_kg,
        })
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => ApiError::conflict("Patient code already exists in this project"),
            other => other.into(),
        })?;

    tracing::info!("Patient {} added to project {}", patient.patient_code, project.id);
    Ok(ApiResponse::created(patient))
}

/// GET /api/patients/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Patient> {
    let (patient, _) = access::patient_for(state.store.as_ref(), &user, id, false).await?;
    Ok(ApiResponse::success(patient))
}

/// PUT /api/patients/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<PatientUpdate>,
) -> ApiResult<Patient> {
    access::patient_for(state.store.as_ref(), &user, id, false).await?;

    let mut errors = FieldErrors::new();
    if matches!(&update.name, Some(name) if name.trim().is_empty()) {
        errors.insert("name".to_string(), "cannot be empty".to_string());
    }
    check_measurements(update.date_of_birth, update.height_cm, update.weight_kg, &mut errors);
    if !errors.is_empty() {
        return Err(ApiError::validation_error("Invalid patient", Some(errors)));
    }

    Ok(ApiResponse::success(state.store.update_patient(id, update).await?))
}

/// DELETE /api/patients/:id - soft delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Patient> {
    access::patient_for(state.store.as_ref(), &user, id, false).await?;
    Ok(ApiResponse::success(state.store.set_patient_deleted(id, true).await?))
}

/// POST /api/patients/:id/restore
pub async fn restore(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Patient> {
    let (patient, project) = access::patient_for(state.store.as_ref(), &user, id, true).await?;
    if project.deleted_at.is_some() {
        return Err(ApiError::conflict("Restore the project first"));
    }
    if patient.deleted_at.is_none() {
        return Err(ApiError::conflict("Patient is not deleted"));
    }
    Ok(ApiResponse::success(state.store.set_patient_deleted(id, false).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_codes_are_path_safe() {
        let mut errors = FieldErrors::new();
        check_code("P-001_a.b", &mut errors);
        assert!(errors.is_empty());

        for bad in ["", "../x", "a/b", ".hidden", "with space"] {
            let mut errors = FieldErrors::new();
            check_code(bad, &mut errors);
            assert!(errors.contains_key("patient_code"), "{} should be rejected", bad);
        }
    }

    #[test]
    fn measurements_are_bounded() {
        let mut errors = FieldErrors::new();
        check_measurements(None, Some(-1.0), Some(80.0), &mut errors);
        assert!(errors.contains_key("height_cm"));
        assert!(!errors.contains_key("weight_kg"));
    }
}
