use serde_json::{json, Value};
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{DatabaseManager, PgStore, Store};

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data) = data {
                response["data"] = data;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a warning line; JSON output carries warnings inside `data`.
pub fn output_warning(output_format: OutputFormat, message: &str) {
    if let OutputFormat::Text = output_format {
        eprintln!("! {}", message);
    }
}

/// Print `key: value` pairs of a JSON object in text mode.
pub fn output_fields(output_format: OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => {
            if let Some(object) = value.as_object() {
                for (key, field) in object {
                    match field {
                        Value::String(s) => println!("{}: {}", key, s),
                        Value::Null => println!("{}: -", key),
                        other => println!("{}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

/// The database URL the CLI works against.
pub fn database_url() -> anyhow::Result<String> {
    config()
        .database
        .url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))
}

/// Connect to Postgres with the same pool settings the API uses.
pub async fn connect_store() -> anyhow::Result<Arc<dyn Store>> {
    let database = &config().database;
    database_url()?;
    let pool = DatabaseManager::connect(database).await?;
    Ok(Arc::new(PgStore::new(pool, database.slow_query_threshold_ms)))
}
