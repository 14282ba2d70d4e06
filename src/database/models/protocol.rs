use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::movement::ProtocolConfiguration;

#[derive(Debug, Clone, Serialize)]
pub struct Protocol {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub configuration: ProtocolConfiguration,
    pub is_public: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Protocol {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewProtocol {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub configuration: ProtocolConfiguration,
    pub is_public: bool,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ProtocolUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub configuration: Option<ProtocolConfiguration>,
    pub is_public: Option<bool>,
}

/// Embedded next to recordings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSummary {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub deleted: bool,
}

impl From<&Protocol> for ProtocolSummary {
    fn from(p: &Protocol) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            version: p.version.clone(),
            deleted: p.is_deleted(),
        }
    }
}

/// Which protocols a caller may list.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolFilter {
    /// `None` lists every protocol (admins); otherwise public ones plus those created by this user.
    pub visible_to: Option<Uuid>,
    pub include_deleted: bool,
}
