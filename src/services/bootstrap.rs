use std::sync::Arc;

use crate::auth::hash_password;
use crate::config::SecurityConfig;
use crate::database::models::{normalize_email, NewUser, Role, User};
use crate::database::Store;
use crate::services::accounts::{looks_like_email, MIN_PASSWORD_LEN};

/// Create an approved admin account.
pub async fn create_admin(
    store: &Arc<dyn Store>,
    email: &str,
    password: &str,
    full_name: &str,
    bcrypt_cost: u32,
) -> anyhow::Result<User> {
    let email = normalize_email(email);
    anyhow::ensure!(looks_like_email(&email), "'{}' is not a valid email address", email);
    anyhow::ensure!(
        password.chars().count() >= MIN_PASSWORD_LEN,
        "admin password must be at least {} characters",
        MIN_PASSWORD_LEN
    );

    let password_hash = hash_password(password, bcrypt_cost).await?;
    let user = store
        .create_user(NewUser {
            email,
            password_hash,
            full_name: full_name.to_string(),
            phone_number: None,
            hospital_institute: None,
            department: None,
            role: Role::Admin,
            is_approved: true,
        })
        .await?;
    Ok(user)
}

/// Seed the first admin from ADMIN_EMAIL / ADMIN_PASSWORD when no users exist.
/// Returns the created admin, or `None` when nothing had to be done.
pub async fn seed_admin(store: &Arc<dyn Store>, security: &SecurityConfig) -> anyhow::Result<Option<User>> {
    if store.count_users().await? > 0 {
        return Ok(None);
    }

    let (Some(email), Some(password)) = (&security.admin_email, &security.admin_password) else {
        tracing::warn!("No users exist and ADMIN_EMAIL/ADMIN_PASSWORD are not set; nobody can log in");
        return Ok(None);
    };

    let admin = create_admin(store, email, password, "Administrator", security.bcrypt_cost).await?;
    tracing::info!("Seeded admin account {}", admin.email);
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;

    #[tokio::test]
    async fn seeds_only_into_an_empty_store() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut security = AppConfig::development().security;
        security.admin_email = Some("Admin@Clinic.org".into());
        security.admin_password = Some("change-me-now".into());

        let admin = seed_admin(&store, &security).await.unwrap().expect("seeded");
        assert_eq!(admin.email, "admin@clinic.org");
        assert!(admin.role.is_admin());
        assert!(admin.is_approved);

        assert!(seed_admin(&store, &security).await.unwrap().is_none());
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_skip_seeding() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let security = AppConfig::development().security;
        assert!(seed_admin(&store, &security).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn weak_passwords_are_refused() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        assert!(create_admin(&store, "a@b.org", "short", "A", 4).await.is_err());
    }
}
