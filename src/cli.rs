//! Command-line interface definitions and the interactive mode prompt.
//!
//! Credentials are read from environment variables (a `.env` file is loaded
//! first) and can be overridden with the matching flags. The run mode is not
//! a flag: it is picked at the interactive prompt, see [`Mode`].

use clap::Parser;

/// Command-line arguments for topic_digest.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, default settings
/// topic_digest
///
/// # With a settings file
/// topic_digest --config ./digest.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Perplexity API key
    #[arg(long, env = "PERPLEXITY_API_KEY", hide_env_values = true)]
    pub perplexity_api_key: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Destination chat: an @channel handle or a numeric chat id
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,
}

/// What the process does after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Publish one topic once.
    Single,
    /// Publish the scheduled topics at every configured firing time.
    Schedule,
    /// Publish every batch topic once, with a delay between topics.
    Batch,
}

impl Mode {
    /// Map a prompt answer to a mode. Only the trimmed single characters
    /// `1`, `2` and `3` are accepted.
    pub fn from_choice(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Mode::Single),
            "2" => Some(Mode::Schedule),
            "3" => Some(Mode::Batch),
            _ => None,
        }
    }
}

/// Text shown before reading the mode choice.
pub const MENU: &str = "Select mode:\n  \
    1 - send one digest now\n  \
    2 - run on schedule\n  \
    3 - send a digest for every batch topic\n\
    Choice: ";
