//! CLI definitions for yinxue-chat

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "yinxue-chat")]
#[command(about = "Chat with an LLM through the yinxue relay", long_about = None)]
pub struct Cli {
    /// Relay base URL
    #[arg(long, global = true, env = "YINXUE_RELAY_URL", default_value = "http://127.0.0.1:8848")]
    pub relay: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and print the reply as it streams in
    Chat {
        /// System prompt text
        #[arg(long, conflicts_with = "system_file")]
        system: Option<String>,

        /// Read the system prompt from a file
        #[arg(long)]
        system_file: Option<String>,

        /// Print only the final reply instead of live deltas
        #[arg(long)]
        no_stream: bool,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Message text (read from stdin when omitted)
        query: Vec<String>,
    },

    /// Check that the configured LLM API is reachable
    Test,

    /// Show or change the stored LLM settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings (API key masked)
    Show,

    /// Update stored settings
    Set {
        /// OpenAI-compatible API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// API key
        #[arg(long)]
        api_key: Option<String>,

        /// Model name
        #[arg(long)]
        model_name: Option<String>,
    },
}
