use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::patient::PatientSummary;
use super::protocol::ProtocolSummary;

/// Processing state of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 4] = [
        SessionStatus::Uploaded,
        SessionStatus::Processing,
        SessionStatus::Completed,
        SessionStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Uploaded => "uploaded",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    /// uploaded -> processing -> completed | failed, and failed -> processing for retries.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Uploaded, SessionStatus::Processing)
                | (SessionStatus::Processing, SessionStatus::Completed)
                | (SessionStatus::Processing, SessionStatus::Failed)
                | (SessionStatus::Failed, SessionStatus::Processing)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown session status '{}'", s))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSession {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub protocol_id: Option<Uuid>,
    pub recorded_by: Uuid,
    pub status: SessionStatus,
    pub video_path: Option<String>,
    pub keypoints_path: Option<String>,
    pub video_sha256: Option<String>,
    pub keypoints_sha256: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub patient_id: Uuid,
    pub protocol_id: Option<Uuid>,
    pub recorded_by: Uuid,
    pub video_path: Option<String>,
    pub keypoints_path: Option<String>,
    pub video_sha256: Option<String>,
    pub keypoints_sha256: Option<String>,
    pub notes: Option<String>,
}

/// A recording together with the rows the clients render next to it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: ExperimentSession,
    pub patient: PatientSummary,
    /// `None` when the recording has no protocol or the protocol row is gone.
    pub protocol: Option<ProtocolSummary>,
}
