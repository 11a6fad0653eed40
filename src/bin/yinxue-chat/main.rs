//! yinxue-chat binary entry point

use anyhow::Result;

mod chat;
mod cli;
mod config_cmd;
mod test_cmd;

use clap::Parser;
use cli::{Cli, Commands};
use yinxue_chat::{ClientConfig, SettingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = SettingsStore::default_location()?;
    let client_config = ClientConfig::new(cli.relay);

    match cli.command {
        Commands::Chat {
            system,
            system_file,
            no_stream,
            timeout,
            query,
        } => {
            let system_prompt = match system_file {
                Some(path) => Some(std::fs::read_to_string(path)?),
                None => system,
            };
            chat::run(&store, client_config, system_prompt, no_stream, timeout, query).await?;
        }
        Commands::Test => {
            test_cmd::run(&store, client_config).await?;
        }
        Commands::Config { action } => {
            config_cmd::run(&store, action)?;
        }
    }

    Ok(())
}
