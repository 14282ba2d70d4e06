pub mod pool_mode;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub use pool_mode::{PoolMode, PoolSettings};

/// Secret used when running locally without JWT_SECRET.
const DEVELOPMENT_JWT_SECRET: &str = "synaptihand-development-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Absent in development means the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_upload_bytes: usize,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
    pub bcrypt_cost: u32,
    pub admin_email: Option<String>,
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Gcs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub local_root: PathBuf,
    pub gcs_bucket: Option<String>,
    pub gcs_prefix: String,
    #[serde(skip_serializing)]
    pub gcs_access_token: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set outside development")]
    Required(&'static str),

    #[error("GCS storage requires GCS_BUCKET")]
    MissingBucket,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // API overrides
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            self.security.admin_email = Some(v);
        }
        if let Ok(v) = env::var("ADMIN_PASSWORD") {
            self.security.admin_password = Some(v);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_TYPE") {
            self.storage.kind = match v.to_ascii_lowercase().as_str() {
                "gcs" => StorageKind::Gcs,
                "local" => StorageKind::Local,
                other => {
                    tracing::warn!("Unknown STORAGE_TYPE '{}', falling back to local", other);
                    StorageKind::Local
                }
            };
        }
        if let Ok(v) = env::var("STORAGE_LOCAL_DIR") {
            self.storage.local_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var("GCS_BUCKET") {
            self.storage.gcs_bucket = Some(v);
        }
        if let Ok(v) = env::var("GCS_PREFIX") {
            self.storage.gcs_prefix = v;
        }
        if let Ok(v) = env::var("GCS_ACCESS_TOKEN") {
            self.storage.gcs_access_token = Some(v);
        }

        self
    }

    /// Check the combinations that cannot work before the server binds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development {
            if self.security.jwt_secret.is_empty() || self.security.jwt_secret == DEVELOPMENT_JWT_SECRET {
                return Err(ConfigError::Required("JWT_SECRET"));
            }
            if self.database.url.is_none() {
                return Err(ConfigError::Required("DATABASE_URL"));
            }
        }
        if self.storage.kind == StorageKind::Gcs && self.storage.gcs_bucket.is_none() {
            return Err(ConfigError::MissingBucket);
        }
        Ok(())
    }

    /// Clamp a requested page size into the configured bounds.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.api.default_page_size)
            .clamp(1, self.api.max_page_size)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                slow_query_threshold_ms: 100,
            },
            api: ApiConfig {
                default_page_size: 50,
                max_page_size: 1000,
                max_upload_bytes: 100 * 1024 * 1024, // 100MB
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                bcrypt_cost: 4,
                admin_email: None,
                admin_password: None,
            },
            storage: StorageConfig {
                kind: StorageKind::Local,
                local_root: PathBuf::from("data"),
                gcs_bucket: None,
                gcs_prefix: "dev-handpose".to_string(),
                gcs_access_token: None,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                slow_query_threshold_ms: 500,
            },
            api: ApiConfig {
                default_page_size: 50,
                max_page_size: 500,
                max_upload_bytes: 100 * 1024 * 1024,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: vec!["https://staging.synaptihand.com".to_string()],
                bcrypt_cost: bcrypt::DEFAULT_COST,
                admin_email: None,
                admin_password: None,
            },
            storage: StorageConfig {
                kind: StorageKind::Local,
                local_root: PathBuf::from("data"),
                gcs_bucket: None,
                gcs_prefix: "staging-handpose".to_string(),
                gcs_access_token: None,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                slow_query_threshold_ms: 1000,
            },
            api: ApiConfig {
                default_page_size: 25,
                max_page_size: 100,
                max_upload_bytes: 100 * 1024 * 1024,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                cors_origins: vec!["https://app.synaptihand.com".to_string()],
                bcrypt_cost: bcrypt::DEFAULT_COST,
                admin_email: None,
                admin_password: None,
            },
            storage: StorageConfig {
                kind: StorageKind::Local,
                local_root: PathBuf::from("data"),
                gcs_bucket: None,
                gcs_prefix: "handpose".to_string(),
                gcs_access_token: None,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.database.url.is_none());
        assert_eq!(config.storage.kind, StorageKind::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret_and_database() {
        let mut config = AppConfig::production();
        assert_eq!(config.storage.kind, StorageKind::Local);
        assert_eq!(config.validate(), Err(ConfigError::Required("JWT_SECRET")));

        config.security.jwt_secret = "s3cret".into();
        assert_eq!(config.validate(), Err(ConfigError::Required("DATABASE_URL")));

        config.database.url = Some("postgres://u:p@db:6543/postgres?pgbouncer=true".into());
        assert!(config.validate().is_ok(), "no bucket is needed without STORAGE_TYPE=gcs");

        config.storage.kind = StorageKind::Gcs;
        assert_eq!(config.validate(), Err(ConfigError::MissingBucket));
        config.storage.gcs_bucket = Some("bucket".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_every_preset_defaults_to_local_storage() {
        for config in [AppConfig::development(), AppConfig::staging(), AppConfig::production()] {
            assert_eq!(config.storage.kind, StorageKind::Local);
        }
    }

    #[test]
    fn test_gcs_requires_bucket() {
        let mut config = AppConfig::development();
        config.storage.kind = StorageKind::Gcs;
        assert_eq!(config.validate(), Err(ConfigError::MissingBucket));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let config = AppConfig::production();
        assert_eq!(config.page_size(None), 25);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(10_000)), 100);
    }
}
