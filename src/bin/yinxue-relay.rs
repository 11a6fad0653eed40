//! yinxue-relay binary
//!
//! Stateless chat relay in front of OpenAI-compatible LLM endpoints

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};
use yinxue_chat::relay::{start_server, RelayConfig};

/// yinxue-relay: streaming chat relay
#[derive(Parser, Debug)]
#[command(name = "yinxue-relay")]
#[command(about = "Streaming chat relay for OpenAI-compatible APIs", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Host to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Seconds to wait for upstream response headers
    #[arg(long)]
    upstream_timeout: Option<u64>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

/// Load relay configuration from file
fn load_relay_config(config_path: &str) -> Result<RelayConfig> {
    let content = std::fs::read_to_string(config_path)?;
    let config: RelayConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Config file given on the command line, else ./relay.toml, else ~/.yinxue/relay.toml
fn find_config_file(explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| {
        let local = "./relay.toml";
        if Path::new(local).exists() {
            return Some(local.to_string());
        }
        let home_config = dirs::home_dir()?.join(".yinxue").join("relay.toml");
        home_config
            .exists()
            .then(|| home_config.display().to_string())
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config_file = find_config_file(args.config.clone());

    let mut config = if let Some(ref config_path) = config_file {
        tracing::info!("Loading config from: {}", config_path);
        load_relay_config(config_path)?
    } else {
        RelayConfig::default()
    };

    // Override with CLI arguments
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(timeout) = args.upstream_timeout {
        config.upstream_timeout_secs = timeout;
    }

    config.validate().map_err(anyhow::Error::msg)?;

    if args.validate {
        println!("Configuration validation:");
        println!("  Config file: {}", config_file.as_deref().unwrap_or("(defaults)"));
        println!("  Host: {}", config.host);
        println!("  Port: {}", config.port);
        println!("  Upstream timeout: {}s", config.upstream_timeout_secs);
        println!("  Connect timeout: {}s", config.connect_timeout_secs);
        println!("\n✓ Configuration is valid");
        return Ok(());
    }

    start_server(config).await
}
