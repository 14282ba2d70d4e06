// handlers/elevated/mod.rs - endpoints behind require_admin
pub mod users;
