//! Flat-body renderer.
//!
//! Used when a digest has no section structure. The body goes through a fixed
//! sequence of local transforms, then is truncated to the body budget before
//! the header, source links and footer are attached:
//!
//! 1. HTML-escape the raw text
//! 2. Drop citation markers such as `[1]`
//! 3. Strip markdown heading marks
//! 4. Bold `label:` prefixes at the start of a line
//! 5. Bold configured keywords as whole words, outside existing bold spans
//! 6. Prefix `D.M` and `D.M.YYYY` dates with `📅`
//! 7. Normalize bullet markers to `—`
//! 8. Strip leftover markdown emphasis
//! 9. Collapse runs of blank lines

use super::markup::{escape_html, truncate_markup};
use super::{Envelope, RenderOptions, assemble};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

static CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\[\d{1,3}\]").unwrap());

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<lead>[ \t]*(?:[-*•—][ \t]+)?)(?P<label>[^\n:<>]{2,40}):").unwrap()
});

static BOLD_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<b>.*?</b>").unwrap());

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<day>\d{1,2})\.(?P<month>\d{1,2})(?:\.\d{4})?\b(?P<percent>[ \t]*%)?").unwrap()
});

static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*•][ \t]+").unwrap());

static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+|__").unwrap());

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]*").unwrap());

static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Render an undivided `content` string plus the envelope into one message.
pub fn render_flat(content: &str, envelope: &Envelope<'_>, options: &RenderOptions) -> String {
    let body = format_body(content, &options.keywords);
    let body = match truncate_markup(&body, options.body_budget) {
        Some(cut) => {
            debug!(
                budget = options.body_budget,
                chars = body.chars().count(),
                "Flat body truncated"
            );
            cut
        }
        None => body,
    };
    assemble(envelope, &body, options)
}

/// Apply every body transform, in order. Does not truncate.
pub fn format_body(content: &str, keywords: &[String]) -> String {
    let text = content.replace("\r\n", "\n");
    let text = escape_html(&text);
    let text = CITATION.replace_all(&text, "");
    let text = HEADING.replace_all(&text, "");
    let text = bold_labels(&text);
    let text = bold_keywords(&text, keywords);
    let text = mark_dates(&text);
    let text = BULLET.replace_all(&text, "— ");
    let text = EMPHASIS.replace_all(&text, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// `Label: text` becomes `<b>Label:</b> text`. Labels without a letter, such
/// as times or dates, are left alone.
fn bold_labels(text: &str) -> String {
    LABEL
        .replace_all(text, |caps: &Captures| {
            let lead = &caps["lead"];
            let label = &caps["label"];
            let has_letter = label.chars().any(char::is_alphabetic);
            if !has_letter || label.trim() != label {
                return caps[0].to_string();
            }
            format!("{lead}<b>{label}:</b>")
        })
        .into_owned()
}

/// Prefix plausible `D.M[.YYYY]` dates with `📅`. Percentages and numbers
/// outside day 1-31 or month 1-12 are decimals, not dates.
fn mark_dates(text: &str) -> String {
    DATE.replace_all(text, |caps: &Captures| {
        let day: u32 = caps["day"].parse().unwrap_or(0);
        let month: u32 = caps["month"].parse().unwrap_or(0);
        if caps.name("percent").is_some() || !(1..=31).contains(&day) || !(1..=12).contains(&month) {
            return caps[0].to_string();
        }
        format!("📅 {}", &caps[0])
    })
    .into_owned()
}

fn keyword_pattern(keywords: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "Keyword pattern did not compile; skipping keyword emphasis");
            None
        }
    }
}

/// Bold whole-word keyword matches that are not already inside `<b>…</b>`.
fn bold_keywords(text: &str, keywords: &[String]) -> String {
    let Some(pattern) = keyword_pattern(keywords) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in BOLD_SPAN.find_iter(text) {
        out.push_str(&pattern.replace_all(&text[last..span.start()], "<b>$0</b>"));
        out.push_str(span.as_str());
        last = span.end();
    }
    out.push_str(&pattern.replace_all(&text[last..], "<b>$0</b>"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::outputs::test_support::{fixed_time, is_well_formed};

    fn keywords() -> Vec<String> {
        vec!["срочно".to_string(), "breaking".to_string()]
    }

    fn options(budget: usize) -> RenderOptions {
        RenderOptions {
            body_budget: budget,
            source_title_budget: 24,
            max_sources: 2,
            keywords: keywords(),
        }
    }

    fn envelope<'a>(topic: &'a str, sources: &'a [Source]) -> Envelope<'a> {
        Envelope {
            topic: Some(topic),
            sources,
            timestamp: fixed_time(),
            channel_tag: "@digest",
        }
    }

    #[test]
    fn test_labels_are_bolded() {
        let body = format_body("Итог дня: рынки выросли\n- Нефть: дорожает", &[]);
        assert_eq!(body, "<b>Итог дня:</b> рынки выросли\n— <b>Нефть:</b> дорожает");
    }

    #[test]
    fn test_times_are_not_labels() {
        let body = format_body("12:30 meeting starts", &[]);
        assert_eq!(body, "12:30 meeting starts");
    }

    #[test]
    fn test_keywords_whole_word_only() {
        let body = format_body("Breaking update on breakingpoint and срочно новости", &keywords());
        assert_eq!(
            body,
            "<b>Breaking</b> update on breakingpoint and <b>срочно</b> новости"
        );
    }

    #[test]
    fn test_keywords_not_nested_in_labels() {
        let body = format_body("Breaking news: markets fall", &keywords());
        assert_eq!(body, "<b>Breaking news:</b> markets fall");
        assert!(is_well_formed(&body));
    }

    #[test]
    fn test_dates_get_calendar_marker() {
        let body = format_body("Summit on 16.10 and vote on 1.11.2026", &[]);
        assert_eq!(body, "Summit on 📅 16.10 and vote on 📅 1.11.2026");
    }

    #[test]
    fn test_decimals_are_not_dates() {
        let body = format_body("up 3.5%, GDP grew 2.3 % in Q3, ratio 1.25, 45.10 points", &[]);
        assert_eq!(body, "up 3.5%, GDP grew 2.3 % in Q3, ratio 1.25, 45.10 points");
    }

    #[test]
    fn test_heading_with_label_loses_hash_marks() {
        let body = format_body("## Итог дня: рынки выросли\n### Главное\n- GDP grew 2.3% in Q3", &[]);
        assert_eq!(body, "<b>Итог дня:</b> рынки выросли\nГлавное\n— GDP grew 2.3% in Q3");
        assert!(!body.contains('#'));
        assert!(is_well_formed(&body));
    }

    #[test]
    fn test_bullets_emphasis_and_blank_lines() {
        let raw = "## Heading\n* **first** item\n- second [1][2]\n\n\n\n• third __x__";
        let body = format_body(raw, &[]);
        assert_eq!(body, "Heading\n— first item\n— second\n\n— third x");
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let body = format_body("use <script> & stuff", &[]);
        assert_eq!(body, "use &lt;script&gt; &amp; stuff");
    }

    #[test]
    fn test_render_flat_layout() {
        let sources = vec![
            Source {
                url: "https://example.com/1".to_string(),
                title: "One".to_string(),
            },
            Source {
                url: "https://example.com/2".to_string(),
                title: "Two".to_string(),
            },
        ];
        let message = render_flat("Short body", &envelope("AI", &sources), &options(700));
        assert_eq!(
            message,
            "📰 <b>AI</b>\n\nShort body\n\n\
             🔗 <a href=\"https://example.com/1\">One</a> | <a href=\"https://example.com/2\">Two</a>\n\n\
             📢 @digest\n🕐 16.10.2026 12:05 МСК"
        );
        assert!(is_well_formed(&message));
    }

    #[test]
    fn test_800_char_body_truncates_to_700() {
        let content = "x".repeat(800);
        let message = render_flat(&content, &envelope("AI", &[]), &options(700));
        let expected_body = format!("{}...", "x".repeat(700));
        assert!(message.contains(&format!("\n\n{expected_body}\n\n")));
        assert!(!message.contains(&"x".repeat(701)));
    }

    #[test]
    fn test_body_within_budget_has_no_ellipsis() {
        let content = "y".repeat(700);
        let message = render_flat(&content, &envelope("AI", &[]), &options(700));
        assert!(message.contains(&content));
        assert!(!message.contains("..."));
    }

    #[test]
    fn test_truncation_keeps_markup_well_formed() {
        let line = "Рынки: нефть дорожает, срочно покупайте\n";
        let content = line.repeat(40);
        let message = render_flat(&content, &envelope("Рынки", &[]), &options(700));
        assert!(message.contains("..."));
        assert!(is_well_formed(&message));

        let body = message
            .split("\n\n")
            .nth(1)
            .unwrap()
            .trim_end_matches("...");
        assert!(body.chars().count() <= 700);
    }
}
