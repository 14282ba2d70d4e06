use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{connect_store, output_success};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::models::normalize_email;
use crate::services::bootstrap;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create an approved admin account")]
    SeedAdmin {
        #[arg(long, help = "Admin email address")]
        email: String,
        #[arg(long, help = "Admin password (at least 8 characters)")]
        password: String,
        #[arg(long, default_value = "Administrator", help = "Display name")]
        name: String,
    },

    #[command(about = "Approve a pending account by email")]
    Approve {
        #[arg(help = "Email of the account to approve")]
        email: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = connect_store().await?;

    match cmd {
        UserCommands::SeedAdmin { email, password, name } => {
            let admin =
                bootstrap::create_admin(&store, &email, &password, &name, config().security.bcrypt_cost).await?;
            output_success(
                output_format,
                &format!("Admin '{}' created", admin.email),
                Some(json!({ "id": admin.id, "email": admin.email })),
            )
        }
        UserCommands::Approve { email } => {
            let email = normalize_email(&email);
            let user = store
                .find_user_by_email(&email)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No account with email '{}'", email))?;

            if user.is_approved {
                return output_success(output_format, &format!("'{}' is already approved", email), None);
            }

            let user = store.set_user_approval(user.id, true).await?;
            output_success(
                output_format,
                &format!("'{}' approved", user.email),
                Some(json!({ "id": user.id, "role": user.role })),
            )
        }
    }
}
