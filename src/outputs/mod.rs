//! Rendering of digests into Telegram HTML messages.
//!
//! Two variants share one envelope:
//!
//! - [`sections`]: one bold header per parsed [`Section`](crate::models::Section)
//!   followed by its bullet entries
//! - [`flat`]: a single body with local text transforms, used when the digest
//!   has no section structure
//! - [`markup`]: escaping, anchors, the footer and tag-safe truncation
//!
//! # Message Layout
//!
//! ```text
//! 📰 <b>topic</b>               (optional header)
//!
//! body                          (truncated before anything else is attached)
//!
//! 🔗 <a href="…">title</a> | <a href="…">title</a>   (omitted without sources)
//!
//! 📢 @channel                   (omitted without a tag)
//! 🕐 16.10.2026 12:05 МСК
//! ```
//!
//! Only `<b>` and `<a>` tags are ever emitted.

pub mod flat;
pub mod markup;
pub mod sections;

use crate::config::Settings;
use crate::models::Source;
use chrono::{DateTime, Utc};

/// Limits for one renderer variant.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Maximum characters of body text, excluding the `...` marker.
    pub body_budget: usize,
    /// Maximum characters of one source link title.
    pub source_title_budget: usize,
    pub max_sources: usize,
    /// Words bolded by the flat renderer.
    pub keywords: Vec<String>,
}

impl RenderOptions {
    pub fn flat(settings: &Settings) -> Self {
        Self {
            body_budget: settings.flat_body_budget,
            source_title_budget: settings.flat_source_title_budget,
            max_sources: settings.max_sources,
            keywords: settings.keywords.clone(),
        }
    }

    pub fn sections(settings: &Settings) -> Self {
        Self {
            body_budget: settings.section_body_budget,
            source_title_budget: settings.section_source_title_budget,
            max_sources: settings.max_sources,
            keywords: Vec::new(),
        }
    }
}

/// Everything around the body of one message.
#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    pub topic: Option<&'a str>,
    pub sources: &'a [Source],
    pub timestamp: DateTime<Utc>,
    pub channel_tag: &'a str,
}

/// Join header, truncated body, source line and footer with blank lines.
fn assemble(envelope: &Envelope<'_>, body: &str, options: &RenderOptions) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(4);

    if let Some(topic) = envelope.topic.map(str::trim).filter(|t| !t.is_empty()) {
        parts.push(markup::topic_header(topic));
    }
    if !body.is_empty() {
        parts.push(body.to_string());
    }
    if let Some(links) = markup::source_line(
        envelope.sources,
        options.max_sources,
        options.source_title_budget,
    ) {
        parts.push(links);
    }
    parts.push(markup::footer(envelope.channel_tag, &envelope.timestamp));

    parts.join("\n\n")
}
