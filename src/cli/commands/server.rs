use clap::Subcommand;
use serde_json::Value;
use std::time::Duration;

use crate::cli::utils::{output_fields, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from the API /health endpoint")]
    Health {
        #[arg(long, default_value = "http://localhost:3000", help = "Server base URL")]
        url: String,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Health { url } => {
            let endpoint = health_url(&url)?;
            let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
            let response = client.get(endpoint.clone()).send().await?;
            let status = response.status();
            let body: Value = response.json().await?;

            let data = body.get("data").cloned().unwrap_or(Value::Null);
            output_fields(output_format, &data)?;

            if !status.is_success() {
                anyhow::bail!("{} answered {}", endpoint, status);
            }
            output_success(output_format, &format!("{} is healthy", url), None)
        }
    }
}

fn health_url(base: &str) -> anyhow::Result<url::Url> {
    let base = url::Url::parse(base)?;
    Ok(base.join("/health")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_url_replaces_path() {
        assert_eq!(
            health_url("http://localhost:3000/api").unwrap().as_str(),
            "http://localhost:3000/health"
        );
        assert!(health_url("not a url").is_err());
    }
}
