//! Terminal front-end for a single JARVIS dialogue session.
//!
//! Reads one submission per line from stdin and draws the agent's replies,
//! progress and input prompt on stdout. Logs go to stderr.

mod terminal;

use crate::terminal::TerminalPresenter;
use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use clap::Parser;
use jarvis_core::responder::OpenAIResponder;
use jarvis_core::{DialogueConfig, DialogueError, DialogueSession, Mode};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Talk to JARVIS from the terminal")]
struct Cli {
    /// Answer conversational turns with the OpenAI chat API (needs OPENAI_API_KEY)
    #[arg(long)]
    live: bool,

    /// Chat model used by --live
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Skip the opening greeting
    #[arg(long)]
    no_greeting: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Load Configuration ---
    let config = DialogueConfig::from_env().context("Failed to load dialogue configuration")?;
    let greeting_delay = config.greeting_delay;

    // --- 4. Build the Session ---
    let presenter = Arc::new(TerminalPresenter::new(std::io::stdout()));
    let mut session = DialogueSession::new(config, presenter);
    if args.live {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .context("--live requires OPENAI_API_KEY")?;
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            openai_config = openai_config.with_api_base(base);
        }
        tracing::info!(model = %args.model, "Using live OpenAI responder.");
        session = session.with_responder(Arc::new(OpenAIResponder::new(openai_config, args.model)));
    }
    let session = Arc::new(session);

    if args.no_greeting {
        session.skip_greeting();
    }
    let greeter = (!args.no_greeting).then(|| {
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(greeting_delay).await;
            if let Err(e) = session.greet().await {
                tracing::debug!(error = %e, "Greeting skipped");
            }
        })
    });

    // --- 5. Serve stdin ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turns = JoinSet::new();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else { break };
                let session = session.clone();
                turns.spawn(async move {
                    match session.submit(&line).await {
                        Ok(()) => {}
                        Err(DialogueError::Busy) => tracing::debug!("Submission dropped while busy."),
                        Err(e) => tracing::debug!(error = %e, "Submission rejected."),
                    }
                });
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                // The first Ctrl+C stops the current turn, a second one on an idle session exits.
                if session.mode() == Mode::Idle {
                    break;
                }
                session.interrupt();
            }
        }
        while let Some(joined) = turns.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = ?e, "Turn task panicked.");
            }
        }
    }

    // Let the last turn finish when stdin closes.
    while turns.join_next().await.is_some() {}
    if let Some(greeter) = greeter {
        greeter.abort();
    }
    println!();
    Ok(())
}
