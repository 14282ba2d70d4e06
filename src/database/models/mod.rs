pub mod patient;
pub mod project;
pub mod protocol;
pub mod session;
pub mod stats;
pub mod user;

pub use patient::{NewPatient, Patient, PatientSummary, PatientUpdate};
pub use project::{NewProject, Project, ProjectUpdate};
pub use protocol::{NewProtocol, Protocol, ProtocolFilter, ProtocolSummary, ProtocolUpdate};
pub use session::{ExperimentSession, NewSession, SessionDetail, SessionStatus};
pub use stats::Stats;
pub use user::{normalize_email, NewUser, Role, User};

use serde::Deserialize;
use uuid::Uuid;

/// Row visibility for owner-scoped entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Owner(Uuid),
}

impl Scope {
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Scope::All => None,
            Scope::Owner(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

/// `?limit=&offset=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
