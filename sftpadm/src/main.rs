mod cli;
mod config;

use sftpadm_core::AdminClient;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, USAGE, parse_command, run};
use crate::config::CliConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let command = parse_command(std::env::args())?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }
    let config = CliConfig::from_env();
    let client = AdminClient::new(config.client_config()?)?;
    tracing::debug!(base_url = %client.config().base_url(), ?command, "running command");
    let output = run(&client, command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
