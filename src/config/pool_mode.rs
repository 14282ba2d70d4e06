//! Connection pooler detection.
//!
//! Supabase exposes the same database through PgBouncer in two modes. Session
//! mode (port 5432 on the pooler host) pins one server connection per client
//! connection and tops out around twenty, which a stateless API exhausts under
//! concurrent load. Transaction mode (port 6543, `pgbouncer=true`) returns the
//! server connection after every transaction but cannot keep prepared
//! statements between them.

use serde::Serialize;
use std::fmt;
use url::Url;

/// Port of the transaction-mode pooler.
pub const TRANSACTION_POOLER_PORT: u16 = 6543;

/// Port shared by direct connections and the session-mode pooler.
pub const SESSION_POOLER_PORT: u16 = 5432;

/// Highest pool size that stays under the session pooler's client cap.
pub const SESSION_MODE_MAX_CONNECTIONS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    Direct,
    Session,
    Transaction,
}

impl PoolMode {
    /// Infer the pooling mode from a Postgres connection string.
    pub fn detect(database_url: &str) -> PoolMode {
        let url = match Url::parse(database_url) {
            Ok(url) => url,
            Err(_) => return PoolMode::Direct,
        };

        let pgbouncer_flag = url
            .query_pairs()
            .any(|(k, v)| k == "pgbouncer" && v.eq_ignore_ascii_case("true"));
        let port = url.port().unwrap_or(SESSION_POOLER_PORT);

        if pgbouncer_flag || port == TRANSACTION_POOLER_PORT {
            return PoolMode::Transaction;
        }

        let pooler_host = url
            .host_str()
            .map(|h| h.contains(".pooler.") || h.starts_with("pooler."))
            .unwrap_or(false);

        if pooler_host && port == SESSION_POOLER_PORT {
            PoolMode::Session
        } else {
            PoolMode::Direct
        }
    }
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolMode::Direct => write!(f, "direct"),
            PoolMode::Session => write!(f, "session"),
            PoolMode::Transaction => write!(f, "transaction"),
        }
    }
}

/// Effective pool options after applying the pooler's constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSettings {
    pub mode: PoolMode,
    pub max_connections: u32,
    pub statement_cache: bool,
    pub warning: Option<String>,
}

impl PoolSettings {
    pub fn resolve(mode: PoolMode, configured_max: u32) -> PoolSettings {
        match mode {
            PoolMode::Session => PoolSettings {
                mode,
                max_connections: configured_max.min(SESSION_MODE_MAX_CONNECTIONS),
                statement_cache: true,
                warning: Some(format!(
                    "DATABASE_URL points at the session-mode pooler; connections are held per client \
                     and the pool is capped at {}. Use port {} with ?pgbouncer=true for transaction mode.",
                    SESSION_MODE_MAX_CONNECTIONS, TRANSACTION_POOLER_PORT
                )),
            },
            PoolMode::Transaction => PoolSettings {
                mode,
                max_connections: configured_max,
                statement_cache: false,
                warning: None,
            },
            PoolMode::Direct => PoolSettings {
                mode,
                max_connections: configured_max,
                statement_cache: true,
                warning: None,
            },
        }
    }

    pub fn for_url(database_url: &str, configured_max: u32) -> PoolSettings {
        Self::resolve(PoolMode::detect(database_url), configured_max)
    }
}
