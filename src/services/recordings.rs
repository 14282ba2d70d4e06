use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{NewSession, Page, SessionDetail, SessionStatus};
use crate::database::Store;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::access;
use crate::services::protocols::ProtocolService;
use crate::storage::{FileStorage, StorageError, StoredObject};

pub const VIDEO_FILE: &str = "recording.webm";
pub const KEYPOINTS_FILE: &str = "keypoints.json";

const MAX_NOTES_LEN: usize = 5000;
const MAX_DIRECTORY_ATTEMPTS: usize = 100;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Parsed multipart form of `POST /api/patients/:id/recordings`.
#[derive(Debug, Default)]
pub struct RecordingUpload {
    pub video: Option<UploadedFile>,
    pub keypoints: Option<UploadedFile>,
    pub protocol_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// `projects/{project_id}/{patient_code}/{YYYYMMDD-HHMMSS}`
pub fn storage_prefix(project_id: Uuid, patient_code: &str, at: DateTime<Utc>) -> String {
    format!("projects/{}/{}/{}", project_id, patient_code, at.format("%Y%m%d-%H%M%S"))
}

pub struct RecordingService {
    store: Arc<dyn Store>,
    storage: Arc<dyn FileStorage>,
}

impl RecordingService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn FileStorage>) -> Self {
        Self { store, storage }
    }

    pub async fn list(&self, user: &AuthUser, patient_id: Uuid, page: Page) -> Result<Vec<SessionDetail>, ApiError> {
        access::patient_for(self.store.as_ref(), user, patient_id, false).await?;
        Ok(self.store.list_sessions_for_patient(patient_id, page).await?)
    }

    pub async fn upload(
        &self,
        user: &AuthUser,
        patient_id: Uuid,
        upload: RecordingUpload,
    ) -> Result<SessionDetail, ApiError> {
        let (patient, _project) = access::patient_for(self.store.as_ref(), user, patient_id, false).await?;

        let video = upload
            .video
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| ApiError::field("video", "video file is missing"))?;
        let keypoints = upload
            .keypoints
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| ApiError::field("keypoints", "keypoints file is missing"))?;

        if serde_json::from_slice::<serde_json::Value>(&keypoints.bytes).is_err() {
            return Err(ApiError::field("keypoints", "keypoints must be valid JSON"));
        }
        if let Some(notes) = &upload.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(ApiError::field(
                    "notes",
                    format!("must be at most {} characters", MAX_NOTES_LEN),
                ));
            }
        }

        let protocol_id = match upload.protocol_id {
            Some(id) => Some(ProtocolService::new(self.store.clone()).attachable(user, id).await?.id),
            None => None,
        };

        let base = storage_prefix(patient.project_id, &patient.patient_code, Utc::now());
        let video_type = video.content_type.as_deref().unwrap_or("video/webm");
        let (prefix, stored_video) = self.claim_directory(&base, &video.bytes, video_type).await?;

        let stored_keypoints = match self
            .storage
            .put(&format!("{}/{}", prefix, KEYPOINTS_FILE), &keypoints.bytes, "application/json")
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Keypoints upload failed; orphaned object {}", stored_video.path);
                return Err(e.into());
            }
        };

        let created = self
            .store
            .create_session(NewSession {
                patient_id: patient.id,
                protocol_id,
                recorded_by: user.id,
                video_path: Some(stored_video.path.clone()),
                keypoints_path: Some(stored_keypoints.path.clone()),
                video_sha256: Some(stored_video.sha256),
                keypoints_sha256: Some(stored_keypoints.sha256),
                notes: upload.notes,
            })
            .await;
        let session = match created {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    "Session insert failed; orphaned objects {} and {}",
                    stored_video.path,
                    stored_keypoints.path
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            "Recording {} uploaded for patient {} ({} + {} bytes)",
            session.id,
            patient.patient_code,
            stored_video.size,
            stored_keypoints.size
        );

        self.store
            .get_session(session.id)
            .await?
            .ok_or_else(|| ApiError::internal_server_error("Recording vanished after upload"))
    }

    /// Store the video under the first free directory: `base`, then `base-1`, `base-2`, ...
    /// Existing objects are never replaced, so the video write claims the directory.
    async fn claim_directory(
        &self,
        base: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(String, StoredObject), ApiError> {
        for attempt in 0..MAX_DIRECTORY_ATTEMPTS {
            let prefix = if attempt == 0 {
                base.to_string()
            } else {
                format!("{}-{}", base, attempt)
            };
            match self
                .storage
                .put(&format!("{}/{}", prefix, VIDEO_FILE), bytes, content_type)
                .await
            {
                Ok(stored) => return Ok((prefix, stored)),
                Err(StorageError::AlreadyExists(key)) => {
                    tracing::debug!("{} is taken, trying the next directory", key);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ApiError::conflict("Too many recordings uploaded for this patient at the same time"))
    }

    pub async fn get(&self, user: &AuthUser, id: Uuid) -> Result<SessionDetail, ApiError> {
        access::session_for(self.store.as_ref(), user, id).await
    }

    pub async fn update_status(
        &self,
        user: &AuthUser,
        id: Uuid,
        next: SessionStatus,
    ) -> Result<SessionDetail, ApiError> {
        let detail = access::session_for(self.store.as_ref(), user, id).await?;
        let current = detail.session.status;
        if !current.can_transition_to(next) {
            let mut errors = crate::movement::FieldErrors::new();
            errors.insert(
                "status".to_string(),
                format!("cannot move from '{}' to '{}'", current, next),
            );
            return Err(ApiError::unprocessable_entity("Invalid status transition", errors));
        }

        self.store.update_session_status(id, current, next).await?;
        tracing::info!("Session {} moved {} -> {}", id, current, next);
        access::session_for(self.store.as_ref(), user, id).await
    }
}
