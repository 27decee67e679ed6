//! Search API interaction.
//!
//! This module fetches a topic digest from a Perplexity-compatible
//! `/chat/completions` endpoint.
//!
//! # Architecture
//!
//! - [`SummaryFetcher`]: the seam the publish pipeline depends on
//! - [`PerplexityClient`]: the HTTP implementation
//!
//! There is no retry layer. A failed fetch comes back as a [`FetchError`] and
//! the caller skips that cycle.

use crate::config::Settings;
use crate::errors::FetchError;
use crate::models::{ChatMessage, ChatRequest, ChatResponse, FetchResult, Recency};
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Anything that can turn a topic into a digest.
pub trait SummaryFetcher {
    /// Fetch one digest for `topic`, limited to sources within `recency`.
    async fn fetch(&self, topic: &str, recency: Recency) -> Result<FetchResult, FetchError>;
}

/// HTTP client for the search API.
pub struct PerplexityClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    system_prompt: String,
    language: String,
}

impl std::fmt::Debug for PerplexityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerplexityClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl PerplexityClient {
    /// Build a client from settings. The request timeout applies to each call.
    pub fn new(api_key: &str, settings: &Settings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                settings.search_base_url.trim_end_matches('/')
            ),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            system_prompt: settings.system_prompt.clone(),
            language: settings.language.clone(),
        })
    }

    /// The request body for `topic`.
    pub fn build_request(&self, topic: &str, recency: Recency) -> ChatRequest {
        let user = format!(
            "Summarize the most important news about \"{topic}\" from {}. \
             Group the news into 2-5 sections. Start each section with a line \
             holding one emoji and a short title (under 30 characters), then \
             list the events as lines starting with \"- \". Respond in {}.",
            recency.phrase(),
            self.language
        );

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            search_recency_filter: recency,
        }
    }
}

impl SummaryFetcher for PerplexityClient {
    #[instrument(level = "info", skip(self, recency), fields(model = %self.model, %recency))]
    async fn fetch(&self, topic: &str, recency: Recency) -> Result<FetchResult, FetchError> {
        let t0 = Instant::now();
        let request = self.build_request(topic, recency);

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let e = FetchError::from(e);
                warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "Search request failed");
                return Err(e);
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(FetchError::from)?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Search API returned an error status"
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&body, 300),
                "Search API returned non-conforming JSON"
            );
            FetchError::Malformed(e.to_string())
        })?;

        let Some(content) = parsed.content() else {
            warn!("Search API response had no content");
            return Err(FetchError::EmptyContent);
        };

        let result = FetchResult {
            content: content.trim().to_string(),
            sources: parsed.sources(),
            token_usage: parsed.token_usage(),
        };

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = result.content.chars().count(),
            sources = result.sources.len(),
            tokens = result.token_usage,
            "Fetched digest"
        );
        Ok(result)
    }
}
