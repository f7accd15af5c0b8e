//! Interactive tutoring session over stdin.

mod config;
mod runner;

use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use clap::Parser;
use config::Config;
use runner::{SessionRunner, demo_bank, demo_topic};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tutor_core::Command;
use tutor_core::llm_client::OpenAiCompatibleClient;
use tutor_core::registry::{CacheConfig, Registry};

#[derive(Parser, Debug)]
#[command(name = "tutor", about = "Run an interactive math tutoring session")]
struct Cli {
    /// Topic id to run. Only the bundled demo topic ships with the binary.
    #[arg(long, default_value = "topic.math.linear-equations")]
    topic: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string())),
        )
        .init();

    let topic = demo_topic();
    if topic.id != cli.topic {
        anyhow::bail!(
            "unknown topic '{}'; the bundled topic is '{}'",
            cli.topic,
            topic.id
        );
    }

    let mut client_config = OpenAIConfig::new().with_api_key(&config.openai_api_key);
    if let Some(base) = &config.api_base {
        client_config = client_config.with_api_base(base);
    }
    let client = Arc::new(OpenAiCompatibleClient::new(
        client_config,
        config.chat_model.clone(),
    ));

    let registry = Registry::new(CacheConfig {
        ttl: config.cache_ttl,
        max_entries: config.cache_max_entries,
    });
    let mut session = SessionRunner::new(registry, topic, client, demo_bank())?;

    info!(model = %config.chat_model, "session started");
    println!("Tutor: {}", session.current_problem());

    let stdin = std::io::stdin();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            break;
        }

        let outcome = session.handle_turn(input).await?;
        for command in &outcome.commands {
            match command {
                Command::Speak(speech) => println!("Tutor ({:?}): {}", speech.emotion, speech.text),
                Command::Show(content) => println!("{content}"),
                Command::SessionComplete(message) => {
                    println!("Session complete. {message}");
                }
            }
        }
        if outcome.session_complete {
            break;
        }
    }

    Ok(())
}
