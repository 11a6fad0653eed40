//! Chat command implementation

use anyhow::Result;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use yinxue_chat::{ChatClient, ChatOptions, ClientConfig, Message, SettingsStore};

/// Run the chat command
pub async fn run(
    store: &SettingsStore,
    client_config: ClientConfig,
    system_prompt: Option<String>,
    no_stream: bool,
    timeout: Option<u64>,
    query: Vec<String>,
) -> Result<()> {
    let settings = store.load()?;

    let query_text = if query.is_empty() {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        input
    } else {
        query.join(" ")
    };
    let query_text = query_text.trim();
    if query_text.is_empty() {
        anyhow::bail!("nothing to send: pass a message or pipe one on stdin");
    }

    let mut options = ChatOptions::default();
    if let Some(prompt) = system_prompt {
        options = options.with_system_prompt(prompt);
    }
    if let Some(secs) = timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }
    let client = ChatClient::new(client_config, options)?;

    // Ctrl-C aborts the in-flight turn
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let messages = vec![Message::user(query_text)];
    let mut stdout = io::stdout();

    let reply = client
        .stream_message(
            &messages,
            &settings,
            |delta| {
                if !no_stream {
                    print!("{}", delta);
                    let _ = stdout.flush();
                }
            },
            &cancel,
        )
        .await;

    match reply {
        Ok(text) => {
            if no_stream {
                println!("{}", text);
            } else {
                println!();
            }
            Ok(())
        }
        Err(e) if e.is_configuration() => {
            eprintln!("{}", e);
            eprintln!("Run `yinxue-chat config set` to configure the LLM API.");
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
