//! # Topic Digest
//!
//! Fetches a topic-focused news digest from a search-backed LLM
//! (Perplexity-compatible API), turns the free text into titled bullet
//! sections, renders a Telegram HTML message and posts it to a channel.
//!
//! ## Usage
//!
//! ```sh
//! PERPLEXITY_API_KEY=... TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=@channel topic_digest
//! topic_digest --config ./digest.yaml
//! ```
//!
//! ## Architecture
//!
//! Every publish cycle runs strictly in sequence:
//! 1. **Fetching**: ask the search API for a digest on one topic
//! 2. **Parsing**: split the text into emoji/title/bullet sections
//! 3. **Rendering**: build a length-bounded HTML message
//! 4. **Delivery**: post it with the Telegram Bot API
//!
//! The interactive prompt picks one of three modes: a single send, a daily
//! schedule, or a batch over several topics.

use std::error::Error;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod errors;
mod models;
mod outputs;
mod parser;
mod pipeline;
mod scheduler;
mod telegram;
mod utils;

use api::PerplexityClient;
use clap::Parser;
use cli::{Cli, MENU, Mode};
use config::{Credentials, Settings};
use pipeline::{run_batch, run_cycle};
use scheduler::run_schedule;
use telegram::TelegramClient;
use utils::clean_topics;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    // A missing .env file is normal; the environment may already be set.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "Failed to load .env file");
        }
    }

    let args = Cli::parse();

    // ---- Configuration: fail before any network activity ----
    let credentials = Credentials::from_cli(&args).inspect_err(|e| {
        error!(error = %e, "Configuration error");
    })?;
    let settings = Settings::load(args.config.as_deref()).inspect_err(|e| {
        error!(error = %e, "Configuration error");
    })?;
    let channel_tag = settings.channel_tag_for(&credentials.telegram_chat_id);
    info!(chat_id = %credentials.telegram_chat_id, model = %settings.model, "topic_digest starting up");

    let fetcher = PerplexityClient::new(&credentials.perplexity_api_key, &settings)?;
    let delivery = TelegramClient::new(
        &credentials.telegram_bot_token,
        &credentials.telegram_chat_id,
        &settings,
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let choice = prompt(&mut lines, MENU).await?;

    let Some(mode) = Mode::from_choice(&choice) else {
        eprintln!("Invalid choice: {:?}. Expected 1, 2 or 3.", choice.trim());
        return Ok(());
    };
    info!(?mode, "Mode selected");

    match mode {
        Mode::Single => {
            let answer = prompt(
                &mut lines,
                &format!("Topic [{}]: ", settings.default_topic),
            )
            .await?;
            let topic = match answer.trim() {
                "" => settings.default_topic.clone(),
                other => other.to_string(),
            };
            match run_cycle(&fetcher, &delivery, &topic, &channel_tag, &settings).await {
                Ok(()) => println!("Digest for \"{topic}\" sent."),
                Err(e) => {
                    error!(%topic, error = %e, "Cycle failed");
                    println!("Digest for \"{topic}\" was not sent: {e}");
                }
            }
        }
        Mode::Schedule => {
            let topics = clean_topics(&settings.schedule_topics);
            if topics.is_empty() {
                warn!("No schedule topics configured");
                return Ok(());
            }
            run_schedule(&fetcher, &delivery, &topics, &channel_tag, &settings).await;
        }
        Mode::Batch => {
            let topics = clean_topics(&settings.batch_topics);
            if topics.is_empty() {
                warn!("No batch topics configured");
                return Ok(());
            }
            let report = run_batch(&fetcher, &delivery, &topics, &channel_tag, &settings).await;
            println!("Batch finished: {} sent, {} failed.", report.sent, report.failed);
        }
    }

    Ok(())
}

/// Print `question` and read one line. End of input reads as an empty answer.
async fn prompt<R>(
    lines: &mut tokio::io::Lines<R>,
    question: &str,
) -> Result<String, Box<dyn Error>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    print!("{question}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.unwrap_or_default())
}
