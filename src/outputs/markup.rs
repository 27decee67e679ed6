//! Telegram HTML building blocks shared by both renderers.

use crate::models::Source;
use chrono::{DateTime, TimeZone};
use chrono_tz::Europe::Moscow;
use itertools::Itertools;

/// Appended to any body that was cut.
pub const ELLIPSIS: &str = "...";

const SOURCE_SEPARATOR: &str = " | ";
const ZONE_LABEL: &str = "МСК";

/// Escape the three characters Telegram's HTML parser treats specially.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

/// Cut `text` to at most `budget` characters, ending with `…` when cut.
pub fn truncate_title(text: &str, budget: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let kept: String = text.chars().take(budget.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

pub fn topic_header(topic: &str) -> String {
    format!("📰 <b>{}</b>", escape_html(topic))
}

pub fn anchor(source: &Source, title_budget: usize) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape_attr(&source.url),
        escape_html(&truncate_title(&source.title, title_budget))
    )
}

/// Up to `max` links joined by ` | `, or `None` when there is nothing to show.
pub fn source_line(sources: &[Source], max: usize, title_budget: usize) -> Option<String> {
    if sources.is_empty() || max == 0 {
        return None;
    }
    let links = sources
        .iter()
        .take(max)
        .map(|s| anchor(s, title_budget))
        .join(SOURCE_SEPARATOR);
    Some(format!("🔗 {links}"))
}

/// `DD.MM.YYYY HH:MM МСК`, whatever zone `timestamp` carries.
pub fn format_timestamp<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String {
    let local = timestamp.with_timezone(&Moscow);
    format!("{} {ZONE_LABEL}", local.format("%d.%m.%Y %H:%M"))
}

/// Channel attribution (when set) and the publication time.
pub fn footer<Tz: TimeZone>(channel_tag: &str, timestamp: &DateTime<Tz>) -> String {
    let time = format!("🕐 {}", format_timestamp(timestamp));
    let tag = channel_tag.trim();
    if tag.is_empty() {
        time
    } else {
        format!("📢 {}\n{time}", escape_html(tag))
    }
}

/// Cut rendered HTML to `budget` characters without breaking markup.
///
/// Returns `None` when `html` already fits. Otherwise the cut point moves back
/// to the start of any tag, entity or element it would split, and
/// [`ELLIPSIS`] is appended.
pub fn truncate_markup(html: &str, budget: usize) -> Option<String> {
    let (mut cut, _) = html.char_indices().nth(budget)?;
    let head = &html[..cut];

    let mut partial_tag: Option<usize> = None;
    let mut partial_entity: Option<usize> = None;
    let mut open_elements: Vec<usize> = Vec::new();

    for (i, c) in head.char_indices() {
        match c {
            '<' => partial_tag = Some(i),
            '>' => {
                if let Some(start) = partial_tag.take() {
                    let tag = &head[start..=i];
                    if tag.starts_with("</") {
                        open_elements.pop();
                    } else if !tag.ends_with("/>") {
                        open_elements.push(start);
                    }
                }
            }
            '&' => partial_entity = Some(i),
            ';' => partial_entity = None,
            c if !(c.is_ascii_alphanumeric() || c == '#') => partial_entity = None,
            _ => {}
        }
    }

    for start in [partial_tag, partial_entity, open_elements.first().copied()]
        .into_iter()
        .flatten()
    {
        cut = cut.min(start);
    }

    Some(format!("{}{ELLIPSIS}", &html[..cluster_start(html, cut)]))
}

/// Marks that only make sense attached to the character before them.
fn is_extender(c: char) -> bool {
    matches!(c,
        '\u{200D}'
        | '\u{FE0E}'..='\u{FE0F}'
        | '\u{20E3}'
        | '\u{1F3FB}'..='\u{1F3FF}'
        | '\u{E0020}'..='\u{E007F}'
        | '\u{0300}'..='\u{036F}')
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

/// Move a byte offset back so it does not fall inside an emoji sequence,
/// a flag pair or a letter with combining marks.
fn cluster_start(text: &str, mut cut: usize) -> usize {
    loop {
        let Some(next) = text[cut..].chars().next() else {
            return cut;
        };
        let Some(prev) = text[..cut].chars().next_back() else {
            return cut;
        };
        if is_extender(next) || prev == '\u{200D}' {
            cut -= prev.len_utf8();
            continue;
        }
        if is_regional_indicator(next) {
            let before = text[..cut]
                .chars()
                .rev()
                .take_while(|c| is_regional_indicator(*c))
                .count();
            if before % 2 == 1 {
                cut -= prev.len_utf8();
                continue;
            }
        }
        return cut;
    }
}
