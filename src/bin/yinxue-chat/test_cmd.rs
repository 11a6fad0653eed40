//! Test command implementation

use anyhow::Result;
use yinxue_chat::{ChatClient, ChatOptions, ClientConfig, SettingsStore};

/// Run the test command
pub async fn run(store: &SettingsStore, client_config: ClientConfig) -> Result<()> {
    let settings = store.load()?;
    println!("Testing {} ({})...", settings.base_url, settings.model_name);

    let client = ChatClient::new(client_config, ChatOptions::default())?;
    let result = client.test_connection(&settings).await?;

    if result.success {
        println!(
            "✓ {} (model: {})",
            result.message.as_deref().unwrap_or("OK"),
            result.model.as_deref().unwrap_or(settings.model_name.as_str())
        );
        Ok(())
    } else {
        println!("✗ {}", result.error.as_deref().unwrap_or("Connection failed"));
        if let Some(details) = result.details.filter(|d| !d.is_empty()) {
            println!("  {}", details);
        }
        std::process::exit(1);
    }
}
