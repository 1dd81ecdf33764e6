//! Routing demo - preferred provider with automatic fallback
//!
//! Builds a router from a configuration file (first argument) or from the
//! environment (`GEMINI_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
//! `LLM_PRIMARY_PROVIDER`, ...), sends one prompt and prints which provider
//! answered together with the usage statistics.
//!
//! Run with: cargo run --example routing_demo -- [switchboard.yaml]
//! Set `RUST_LOG=switchboard_core=debug` to watch retries and fallbacks.

use anyhow::Context;
use switchboard_core::config::{self, SwitchboardConfig};
use switchboard_core::protocol::Message;
use switchboard_core::Router;
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<SwitchboardConfig> {
    match std::env::args().nth(1) {
        Some(path) if path.ends_with(".json") => {
            config::load_from_json(&path).with_context(|| format!("loading {}", path))
        }
        Some(path) => config::load_from_yaml(&path).with_context(|| format!("loading {}", path)),
        None => Ok(config::from_env()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let router = Router::from_config(&config)?;

    println!("Providers:");
    for provider in router.list_providers() {
        println!(
            "  {:<10} {:<18} initialized={} current={}",
            provider.id.as_str(),
            provider.display_name,
            provider.initialized,
            provider.is_current
        );
    }

    let health = router.check_health().await;
    println!("\nHealth: {:?}", health);

    let messages = vec![Message::user("In one sentence, what is a circuit breaker?")];
    match router
        .generate_response(&messages, None, Some("You are a concise assistant."))
        .await
    {
        Ok(result) => {
            println!("\nAnswered by {:?}:", result.provider);
            println!("{}", result.content);
            if result.backup_credential {
                println!("(served with the backup credential)");
            }
        }
        Err(err) => println!("\nRequest failed: {}", err),
    }

    println!(
        "\nStats:\n{}",
        serde_json::to_string_pretty(&router.get_stats())?
    );
    Ok(())
}
