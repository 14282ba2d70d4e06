use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub projects: i64,
    pub patients: i64,
    pub sessions: i64,
    pub protocols: i64,
    pub sessions_by_status: BTreeMap<String, i64>,
    /// Only reported to admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_users: Option<i64>,
}
