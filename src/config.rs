//! Runtime configuration: required credentials and tunable settings.
//!
//! Credentials come from the environment (or the matching CLI options) and are
//! checked once at startup. Everything else lives in [`Settings`], loaded from
//! an optional YAML file where every field has a default, so a missing file
//! or a partial file both work.

use crate::cli::Cli;
use crate::errors::ConfigError;
use crate::models::Recency;
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument};

/// Telegram's limit on the length of one message's text.
pub const PLATFORM_MESSAGE_LIMIT: usize = 4096;

/// Room reserved for header, source links and footer around a body.
const ENVELOPE_RESERVE: usize = 512;

/// The three values without which nothing can run.
#[derive(Clone)]
pub struct Credentials {
    pub perplexity_api_key: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("perplexity_api_key", &"<redacted>")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}

impl Credentials {
    /// Build credentials from parsed CLI/env values. A missing or blank value
    /// is reported by its environment variable name.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        Ok(Self {
            perplexity_api_key: required(&cli.perplexity_api_key, "PERPLEXITY_API_KEY")?,
            telegram_bot_token: required(&cli.telegram_bot_token, "TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: required(&cli.telegram_chat_id, "TELEGRAM_CHAT_ID")?,
        })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(name))
}

/// Which renderer a cycle uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Sections when the parser finds any, flat body otherwise.
    #[default]
    Auto,
    Sections,
    Flat,
}

/// Tunable settings. See `Settings::default` for the values used when a
/// field is absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub search_base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub recency: Recency,
    pub request_timeout_secs: u64,
    pub system_prompt: String,
    pub language: String,

    pub default_topic: String,
    pub batch_topics: Vec<String>,
    pub schedule_times: Vec<String>,
    pub schedule_topics: Vec<String>,
    pub topic_delay_secs: u64,

    pub render_mode: RenderMode,
    pub flat_body_budget: usize,
    pub section_body_budget: usize,
    pub flat_source_title_budget: usize,
    pub section_source_title_budget: usize,
    pub max_sources: usize,
    pub keywords: Vec<String>,
    pub channel_tag: Option<String>,

    pub telegram_base_url: String,
    pub disable_link_preview: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar".to_string(),
            max_tokens: 1000,
            temperature: 0.2,
            top_p: 0.9,
            recency: Recency::Day,
            request_timeout_secs: 30,
            system_prompt: "You are a news editor for a Telegram channel. Write a short, \
                factual digest grouped into sections. Each section starts with one line \
                holding an emoji and a short title, followed by bullet lines that start \
                with \"- \". No introductions, no conclusions, no markdown emphasis."
                .to_string(),
            language: "Russian".to_string(),

            default_topic: "world news".to_string(),
            batch_topics: vec![
                "world news".to_string(),
                "technology".to_string(),
                "economy".to_string(),
            ],
            schedule_times: vec!["09:00".to_string(), "18:00".to_string()],
            schedule_topics: vec!["world news".to_string()],
            topic_delay_secs: 5,

            render_mode: RenderMode::Auto,
            flat_body_budget: 700,
            section_body_budget: 3500,
            flat_source_title_budget: 24,
            section_source_title_budget: 30,
            max_sources: 2,
            keywords: ["срочно", "важно", "breaking", "urgent", "exclusive", "эксклюзив"]
                .into_iter()
                .map(String::from)
                .collect(),
            channel_tag: None,

            telegram_base_url: "https://api.telegram.org".to_string(),
            disable_link_preview: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| {
                    ConfigError::Read {
                        path: path.to_string(),
                        source,
                    }
                })?;
                let settings = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_string(),
                    source,
                })?;
                info!(path, "Loaded settings file");
                settings
            }
            None => {
                info!("No settings file given; using defaults");
                Self::default()
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Reject values that would make a cycle fail or a message overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for time in &self.schedule_times {
            parse_firing_time(time).ok_or_else(|| ConfigError::Invalid {
                field: "schedule_times",
                reason: format!("`{time}` is not an HH:MM time"),
            })?;
        }

        for (field, budget) in [
            ("flat_body_budget", self.flat_body_budget),
            ("section_body_budget", self.section_body_budget),
        ] {
            if budget == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
            if budget + ENVELOPE_RESERVE > PLATFORM_MESSAGE_LIMIT {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!(
                        "must leave {ENVELOPE_RESERVE} of {PLATFORM_MESSAGE_LIMIT} characters for header and footer"
                    ),
                });
            }
        }

        for (field, budget) in [
            ("flat_source_title_budget", self.flat_source_title_budget),
            ("section_source_title_budget", self.section_source_title_budget),
        ] {
            if budget == 0 || budget > 100 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be between 1 and 100".to_string(),
                });
            }
        }

        if self.max_sources > 5 {
            return Err(ConfigError::Invalid {
                field: "max_sources",
                reason: "at most 5 source links fit in the footer".to_string(),
            });
        }

        if self.default_topic.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_topic",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Channel attribution shown in the footer.
    ///
    /// The configured tag wins; otherwise a public `@handle` chat id doubles
    /// as the tag. Numeric chat ids produce no tag.
    pub fn channel_tag_for(&self, chat_id: &str) -> String {
        match &self.channel_tag {
            Some(tag) => tag.trim().to_string(),
            None if chat_id.starts_with('@') => chat_id.to_string(),
            None => String::new(),
        }
    }
}

/// Parse an `HH:MM` firing time.
pub fn parse_firing_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}
