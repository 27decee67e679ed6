//! Data models for fetched digests, parsed sections and the two remote APIs.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Recency`]: how fresh the search API's source material must be
//! - [`FetchResult`]: text, cited [`Source`]s and token usage from one fetch
//! - [`Section`]: a titled group of bullet entries parsed from the text
//! - Wire types for the search API ([`ChatRequest`], [`ChatResponse`]) and the
//!   Telegram Bot API ([`SendMessageRequest`], [`TelegramResponse`])

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Recency filter understood by the search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recency {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Recency {
    /// Wire value of the `search_recency_filter` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Recency::Hour => "hour",
            Recency::Day => "day",
            Recency::Week => "week",
            Recency::Month => "month",
        }
    }

    /// Phrase used inside the user instruction.
    pub fn phrase(&self) -> &'static str {
        match self {
            Recency::Hour => "the last hour",
            Recency::Day => "the last 24 hours",
            Recency::Week => "the last week",
            Recency::Month => "the last month",
        }
    }
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cited source link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub title: String,
}

/// Everything one successful fetch produces. Consumed once per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub content: String,
    pub sources: Vec<Source>,
    pub token_usage: u64,
}

/// A titled group of bullet entries.
///
/// `title` is never empty after trimming. Each entry is the trimmed source
/// line, bullet marker included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub emoji: String,
    pub title: String,
    pub entries: Vec<String>,
}

/// One chat message in a search API request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub search_recency_filter: Recency,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub search_results: Vec<SearchResult>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: u64,
}

impl ChatResponse {
    /// The first choice's text, if present and not blank.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }

    /// Cited sources in response order.
    ///
    /// Titled `search_results` win; otherwise the bare `citations` list is
    /// used with each link titled by its host. Non-http(s) URLs are skipped.
    pub fn sources(&self) -> Vec<Source> {
        if !self.search_results.is_empty() {
            return self
                .search_results
                .iter()
                .filter_map(|r| {
                    let host = http_host(&r.url)?;
                    let title = r
                        .title
                        .as_deref()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .unwrap_or(host);
                    Some(Source {
                        url: r.url.clone(),
                        title,
                    })
                })
                .collect();
        }

        self.citations
            .iter()
            .filter_map(|url| {
                http_host(url).map(|host| Source {
                    url: url.clone(),
                    title: host,
                })
            })
            .collect()
    }

    pub fn token_usage(&self) -> u64 {
        self.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
    }
}

/// Host of an http(s) URL, without a leading `www.`.
fn http_host(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

/// Request body for the Bot API `sendMessage` method.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
}

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}
