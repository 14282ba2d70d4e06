// handlers/protected/mod.rs - endpoints behind jwt_auth_middleware
pub mod auth;
pub mod patients;
pub mod projects;
pub mod protocols;
pub mod recordings;
pub mod sessions;
pub mod stats;
