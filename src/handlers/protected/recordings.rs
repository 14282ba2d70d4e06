// handlers/protected/recordings.rs - /api/patients/:id/recordings

use axum::extract::{multipart::MultipartError, Multipart, State};
use axum::http::StatusCode;
use axum::Extension;
use uuid::Uuid;

use crate::database::models::{PageQuery, SessionDetail};
use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::recordings::{RecordingUpload, UploadedFile};
use crate::services::RecordingService;
use crate::state::AppState;

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum request size")
    } else {
        ApiError::bad_request(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// Collect the known fields; unknown parts are drained and ignored.
async fn read_upload(mut multipart: Multipart) -> Result<RecordingUpload, ApiError> {
    let mut upload = RecordingUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" | "keypoints" => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                let file = Some(UploadedFile { bytes, content_type });
                if name == "video" {
                    upload.video = file;
                } else {
                    upload.keypoints = file;
                }
            }
            "protocol_id" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = Uuid::parse_str(text).map_err(|_| ApiError::field("protocol_id", "must be a UUID"))?;
                    upload.protocol_id = Some(id);
                }
            }
            "notes" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    upload.notes = Some(text);
                }
            }
            other => {
                tracing::debug!("Ignoring multipart field '{}'", other);
                field.bytes().await.map_err(multipart_error)?;
            }
        }
    }

    Ok(upload)
}

/// GET /api/patients/:id/recordings
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(patient_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<SessionDetail>> {
    let service = RecordingService::new(state.store.clone(), state.storage.clone());
    let recordings = service.list(&user, patient_id, state.page(page)).await?;
    Ok(ApiResponse::success(recordings))
}

/// POST /api/patients/:id/recordings - multipart `video`, `keypoints`,
/// optional `protocol_id` and `notes`
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(patient_id): ApiPath<Uuid>,
    multipart: Multipart,
) -> ApiResult<SessionDetail> {
    let upload = read_upload(multipart).await?;
    let service = RecordingService::new(state.store.clone(), state.storage.clone());
    let recording = service.upload(&user, patient_id, upload).await?;
    Ok(ApiResponse::created(recording))
}
