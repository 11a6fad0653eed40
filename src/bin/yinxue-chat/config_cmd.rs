//! Config command implementation

use crate::cli::ConfigAction;
use anyhow::Result;
use yinxue_chat::SettingsStore;

/// Run the config command
pub fn run(store: &SettingsStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = store.load()?;
            let show = |v: &str| if v.is_empty() { "(not set)".to_string() } else { v.to_string() };
            println!("Settings file: {}", store.path().display());
            println!("  baseUrl:   {}", show(settings.base_url.as_str()));
            println!("  apiKey:    {}", show(settings.masked_api_key().as_str()));
            println!("  modelName: {}", show(settings.model_name.as_str()));
            if !settings.is_configured() {
                println!("\nMissing: {}", settings.missing_fields().join(", "));
            }
        }
        ConfigAction::Set {
            base_url,
            api_key,
            model_name,
        } => {
            // environment overrides are not persisted
            let mut settings = store.load_file()?;
            if let Some(v) = base_url {
                settings.base_url = v;
            }
            if let Some(v) = api_key {
                settings.api_key = v;
            }
            if let Some(v) = model_name {
                settings.model_name = v;
            }
            store.save(&settings)?;
            println!("Saved {}", store.path().display());
        }
    }
    Ok(())
}
