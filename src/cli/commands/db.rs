use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{database_url, output_fields, output_success, output_warning};
use crate::cli::OutputFormat;
use crate::config::{config, PoolMode, PoolSettings};
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Apply the embedded SQL migrations")]
    Migrate,

    #[command(about = "Show the pooler mode and pool settings derived from DATABASE_URL")]
    PoolCheck {
        #[arg(long, help = "Exit non-zero when DATABASE_URL uses the session-mode pooler")]
        strict: bool,
    },
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DbCommands::Migrate => {
            database_url()?;
            let pool = DatabaseManager::connect(&config().database).await?;
            DatabaseManager::migrate(&pool).await?;
            output_success(output_format, "Migrations applied", None)
        }
        DbCommands::PoolCheck { strict } => {
            let url = database_url()?;
            let settings = PoolSettings::for_url(&url, config().database.max_connections);

            output_fields(
                output_format,
                &json!({
                    "mode": settings.mode,
                    "max_connections": settings.max_connections,
                    "statement_cache": settings.statement_cache,
                    "warning": settings.warning,
                }),
            )?;
            if let Some(warning) = &settings.warning {
                output_warning(output_format, warning);
            }

            check_strict(settings.mode, strict)
        }
    }
}

fn check_strict(mode: PoolMode, strict: bool) -> anyhow::Result<()> {
    if strict && mode == PoolMode::Session {
        anyhow::bail!("session-mode pooler rejected by --strict");
    }
    Ok(())
}
